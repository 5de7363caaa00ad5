use std::fmt::{self, Display};

use crate::{
    protocol::ReferenceTypeID,
    session::{SessionId, TargetSession},
};

/// One loaded class inside a particular debug session.
///
/// Only meaningful while the owning session is alive, the same class loaded
/// in another session (or reloaded) gets a different handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeHandle {
    session: SessionId,
    id: ReferenceTypeID,
    signature: String,
    name: String,
}

impl TypeHandle {
    pub fn new(session: SessionId, id: ReferenceTypeID, signature: impl Into<String>) -> Self {
        let signature = signature.into();
        Self {
            name: signature_to_name(&signature),
            session,
            id,
            signature,
        }
    }

    /// The fully qualified name, e.g. `com.example.Widget` or `int[]`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The JNI signature the handle was resolved from.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn id(&self) -> ReferenceTypeID {
        self.id
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn belongs_to(&self, session: &TargetSession) -> bool {
        self.session == session.id()
    }
}

impl Display for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Turns a JNI signature into the name a Java programmer would write.
///
/// Anything that does not look like a signature is returned unchanged.
pub fn signature_to_name(signature: &str) -> String {
    let dims = signature.bytes().take_while(|&b| b == b'[').count();
    let element = &signature[dims..];
    let base = match element {
        "Z" => "boolean",
        "B" => "byte",
        "C" => "char",
        "S" => "short",
        "I" => "int",
        "J" => "long",
        "F" => "float",
        "D" => "double",
        "V" => "void",
        _ => match element.strip_prefix('L').and_then(|s| s.strip_suffix(';')) {
            Some(class) => return class.replace('/', ".") + &"[]".repeat(dims),
            None if dims == 0 => return signature.to_owned(),
            None => element,
        },
    };
    base.to_owned() + &"[]".repeat(dims)
}

/// The inverse of [signature_to_name].
pub fn name_to_signature(name: &str) -> String {
    let mut element = name.trim();
    let mut dims = 0;
    while let Some(inner) = element.strip_suffix("[]") {
        element = inner;
        dims += 1;
    }
    let base = match element {
        "boolean" => "Z".to_owned(),
        "byte" => "B".to_owned(),
        "char" => "C".to_owned(),
        "short" => "S".to_owned(),
        "int" => "I".to_owned(),
        "long" => "J".to_owned(),
        "float" => "F".to_owned(),
        "double" => "D".to_owned(),
        "void" => "V".to_owned(),
        class => format!("L{};", class.replace('.', "/")),
    };
    "[".repeat(dims) + &base
}
