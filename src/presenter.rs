//! The "show instances" workflow: deciding whether it makes sense to offer
//! it, binding a query to the current session, and driving the query on
//! behalf of whatever window displays the results.

use std::sync::Arc;

use log::debug;

use crate::{
    config::QueryConfig,
    counts::{InstanceCount, ReferenceCountProvider},
    error::{Error, Result},
    handle::TypeHandle,
    query::{BackgroundQuery, EnumerationResult, InstanceQuery, InstancesBackend, TargetInstanceQuery},
    session::TargetSession,
};

/// The host debugger, as seen from here.
pub trait DebuggerHost {
    fn current_session(&self) -> Option<TargetSession>;

    fn backend(&self) -> Arc<dyn InstancesBackend>;

    fn query_config(&self) -> QueryConfig {
        QueryConfig::default()
    }
}

/// Whatever the UI knows about the current selection.
///
/// Passed through untouched, only these lookups are made on it.
pub trait SelectionContext {
    /// The class selected in a classes view.
    fn selected_class(&self) -> Option<TypeHandle>;

    /// The runtime type of the value selected in a variables or watches view.
    fn selected_value_type(&self) -> Option<TypeHandle> {
        None
    }

    fn count_provider(&self) -> Option<&dyn ReferenceCountProvider> {
        None
    }
}

/// A window showing instances, made by the host windowing system.
pub trait InstancesWindow {
    fn show(&mut self);

    fn hide(&mut self);
}

/// The host windowing system.
pub trait InstancesDisplay {
    fn open(
        &self,
        session: TargetSession,
        query: Arc<dyn InstanceQuery>,
        label: String,
    ) -> Box<dyn InstancesWindow>;
}

/// The places a "show instances" request can come from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShowInstancesAction {
    /// A class picked in the classes (memory) view.
    FromClassesView,
    /// The class of a value picked in a variables view.
    FromValue,
}

impl ShowInstancesAction {
    pub fn label(self) -> &'static str {
        match self {
            ShowInstancesAction::FromClassesView => "Show Instances",
            ShowInstancesAction::FromValue => "Show Instances of Class",
        }
    }

    pub fn selected_type(self, ctx: &dyn SelectionContext) -> Option<TypeHandle> {
        match self {
            ShowInstancesAction::FromClassesView => ctx.selected_class(),
            ShowInstancesAction::FromValue => ctx.selected_value_type(),
        }
    }

    pub fn instances_count(self, ctx: &dyn SelectionContext) -> InstanceCount {
        match (ctx.count_provider(), self.selected_type(ctx)) {
            (Some(provider), Some(ty)) => provider.total_count(&ty),
            _ => InstanceCount::Unknown,
        }
    }

    /// Offered when something is selected that is not known to be empty.
    pub fn is_enabled(self, ctx: &dyn SelectionContext) -> bool {
        self.selected_type(ctx).is_some() && !self.instances_count(ctx).is_known_empty()
    }

    /// The menu text, with the count when there is one.
    pub fn text(self, ctx: &dyn SelectionContext) -> String {
        match self.instances_count(ctx) {
            InstanceCount::Measured(count) => format!("{} ({count})", self.label()),
            InstanceCount::Unknown => self.label().to_owned(),
        }
    }

    /// Opens and shows an instances window for the selected type.
    ///
    /// Returns `None` without doing anything when there is no session or no
    /// selection anymore; the selection can change between the enablement
    /// check and the click.
    pub fn perform(
        self,
        ctx: &dyn SelectionContext,
        host: &dyn DebuggerHost,
        display: &dyn InstancesDisplay,
    ) -> Option<Box<dyn InstancesWindow>> {
        let Some(session) = host.current_session() else {
            debug!("{:?}: no current session", self);
            return None;
        };
        let Some(ty) = self.selected_type(ctx) else {
            debug!("{:?}: selection is gone", self);
            return None;
        };
        if !ty.belongs_to(&session) || session.is_terminated() {
            debug!("{:?}: {ty} is from another session", self);
            return None;
        }

        let label = ty.name().to_owned();
        let query = TargetInstanceQuery::with_config(
            session.clone(),
            ty,
            host.backend(),
            host.query_config(),
        );
        let mut window = display.open(session, Arc::new(query), label);
        window.show();
        Some(window)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PresenterState {
    Idle,
    Validating,
    Querying,
    Displaying,
    Cancelled,
}

/// What an instances window runs on.
///
/// `Idle -> Validating -> Querying -> Displaying -> Idle`, and `Cancelled`
/// from validation or a running query. The query itself runs on a worker
/// thread, [poll](InstancesPresenter::poll) or [wait](InstancesPresenter::wait)
/// pick up its result on the interaction thread.
#[derive(Debug)]
pub struct InstancesPresenter {
    session: TargetSession,
    query: Arc<dyn InstanceQuery>,
    label: String,
    state: PresenterState,
    /// What the last validation was told.
    count: InstanceCount,
    pending: Option<BackgroundQuery>,
    shown: Option<EnumerationResult>,
    error: Option<Error>,
}

impl InstancesPresenter {
    pub fn new(session: TargetSession, query: Arc<dyn InstanceQuery>, label: impl Into<String>) -> Self {
        Self {
            session,
            query,
            label: label.into(),
            state: PresenterState::Idle,
            count: InstanceCount::Unknown,
            pending: None,
            shown: None,
            error: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn session(&self) -> &TargetSession {
        &self.session
    }

    pub fn state(&self) -> PresenterState {
        self.state
    }

    /// The last successful result.
    pub fn entries(&self) -> Option<&EnumerationResult> {
        self.shown.as_ref()
    }

    /// The failure of the last load, to be rendered inline.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Starts a new round with the count the caller knows about.
    ///
    /// A type measured as empty goes straight back to idle and `false` is
    /// returned; anything else waits for [load](InstancesPresenter::load).
    pub fn validate(&mut self, count: InstanceCount) -> bool {
        if self.state == PresenterState::Querying {
            return false;
        }
        self.state = PresenterState::Validating;
        self.count = count;
        if count.is_known_empty() {
            debug!("{}: no instances, nothing to show", self.label);
            self.state = PresenterState::Idle;
            return false;
        }
        true
    }

    /// Kicks off the query on a worker thread.
    ///
    /// Meant to follow validation, or to page in more entries with a bigger
    /// limit while displaying. Loading from idle or after a cancel validates
    /// again with the last known count, so a type known to be empty stays
    /// idle and nothing is queried.
    pub fn load(&mut self, limit: u32) -> Result<()> {
        match self.state {
            PresenterState::Validating | PresenterState::Displaying => {}
            PresenterState::Querying => return Err(Error::QueryInProgress(self.session.id())),
            state => {
                debug!("{}: load while {state:?}, count {}", self.label, self.count);
                if !self.validate(self.count) {
                    return Ok(());
                }
            }
        }
        self.pending = Some(BackgroundQuery::spawn(self.query.clone(), limit)?);
        self.state = PresenterState::Querying;
        Ok(())
    }

    /// Picks up the query result if it is ready.
    pub fn poll(&mut self) -> PresenterState {
        if let Some(pending) = &mut self.pending {
            if let Some(result) = pending.try_result() {
                self.pending = None;
                self.finish(result);
            }
        }
        self.state
    }

    /// Blocks until the running query (if any) is done.
    pub fn wait(&mut self) -> PresenterState {
        if let Some(pending) = self.pending.take() {
            let result = pending.wait();
            self.finish(result);
        }
        self.state
    }

    fn finish(&mut self, result: Result<EnumerationResult>) {
        if self.state != PresenterState::Querying {
            return;
        }
        match result {
            Ok(result) => {
                self.shown = Some(result);
                self.error = None;
                self.state = PresenterState::Displaying;
            }
            Err(Error::Cancelled) => self.state = PresenterState::Cancelled,
            Err(error) => {
                debug!("{}: {error}", self.label);
                self.error = Some(error);
                self.state = PresenterState::Displaying;
            }
        }
    }

    /// Cancels validation or the running query; later results are dropped.
    pub fn cancel(&mut self) {
        match self.state {
            PresenterState::Validating => self.state = PresenterState::Cancelled,
            PresenterState::Querying => {
                if let Some(pending) = self.pending.take() {
                    pending.cancel();
                }
                self.state = PresenterState::Cancelled;
            }
            _ => {}
        }
    }

    /// The window went away.
    pub fn close(&mut self) {
        self.cancel();
        self.shown = None;
        self.error = None;
        self.count = InstanceCount::Unknown;
        self.state = PresenterState::Idle;
    }
}
