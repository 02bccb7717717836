//! Token identity model
//!
//! Every map in the container is keyed by [`TokenKey`], the canonical
//! form of a [`Token`]. Type tokens key on their `TypeId`, name tokens
//! on the string itself, and alias registrations on
//! `"{type_name} {desc}"` so two registrations built from the same
//! (type, desc) pair always collapse to one key.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

/// A registered class type: its `TypeId` plus a printable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    pub id: TypeId,
    pub name: &'static str,
}

impl TypeKey {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Identity used to look up a dependency.
#[derive(Debug, Clone)]
pub enum Token {
    /// A class token.
    Type(TypeKey),
    /// A string name token.
    Name(Arc<str>),
    /// An alias registration: a base class qualified by a descriptor.
    Registration { base: TypeKey, desc: Arc<str> },
}

impl Token {
    pub fn of<T: 'static>() -> Self {
        Token::Type(TypeKey::of::<T>())
    }

    pub fn name(name: impl Into<Arc<str>>) -> Self {
        Token::Name(name.into())
    }

    pub fn registration<T: 'static>(desc: impl Into<Arc<str>>) -> Self {
        Token::Registration {
            base: TypeKey::of::<T>(),
            desc: desc.into(),
        }
    }

    /// Canonical map key for this token.
    pub fn key(&self) -> TokenKey {
        match self {
            Token::Type(tk) => TokenKey::Type(tk.id),
            Token::Name(n) => TokenKey::Name(n.clone()),
            Token::Registration { base, desc } => {
                TokenKey::Name(format!("{} {}", base.name, desc).into())
            }
        }
    }

    /// The class behind this token, when it is type-shaped.
    pub fn type_key(&self) -> Option<TypeKey> {
        match self {
            Token::Type(tk) => Some(*tk),
            Token::Registration { base, .. } => Some(*base),
            Token::Name(_) => None,
        }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Token {}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Type(tk) => write!(f, "{}", tk),
            Token::Name(n) => f.write_str(n),
            Token::Registration { base, desc } => write!(f, "{} {}", base, desc),
        }
    }
}

/// Canonical, hashable token key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenKey {
    Type(TypeId),
    Name(Arc<str>),
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKey::Type(id) => write!(f, "{:?}", id),
            TokenKey::Name(n) => f.write_str(n),
        }
    }
}
