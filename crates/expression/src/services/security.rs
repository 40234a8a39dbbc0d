//! Permission service seam and its in-memory implementation

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::EntityRef;
use crate::error::{ExpressionError, ExpressionResult};

/// Permission a principal can hold on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Read,
    Write,
    Delete,
    AccessControl,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
            Self::AccessControl => "accessControl",
        }
    }

    /// Parse a comma-separated permission list such as `"read, write"`
    pub fn parse_list(list: &str) -> ExpressionResult<Vec<Self>> {
        list.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for Permission {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "delete" => Ok(Self::Delete),
            "accessControl" => Ok(Self::AccessControl),
            other => Err(ExpressionError::framework(
                422,
                format!("Unknown permission '{other}'"),
            )),
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Grants and checks permissions of principals on nodes
pub trait SecurityService: Send + Sync {
    fn grant(
        &self,
        principal: &EntityRef,
        node: &EntityRef,
        permission: Permission,
    ) -> ExpressionResult<()>;

    fn revoke(
        &self,
        principal: &EntityRef,
        node: &EntityRef,
        permission: Permission,
    ) -> ExpressionResult<()>;

    fn is_granted(&self, principal: &EntityRef, node: &EntityRef, permission: Permission) -> bool;
}

/// Permission table held in memory, keyed by principal and node id
#[derive(Debug, Default)]
pub struct MemorySecurity {
    grants: RwLock<HashMap<(String, String), HashSet<Permission>>>,
}

impl MemorySecurity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<dyn SecurityService> {
        Arc::new(Self::new())
    }
}

impl SecurityService for MemorySecurity {
    fn grant(
        &self,
        principal: &EntityRef,
        node: &EntityRef,
        permission: Permission,
    ) -> ExpressionResult<()> {
        self.grants
            .write()
            .entry((principal.id.clone(), node.id.clone()))
            .or_default()
            .insert(permission);
        Ok(())
    }

    fn revoke(
        &self,
        principal: &EntityRef,
        node: &EntityRef,
        permission: Permission,
    ) -> ExpressionResult<()> {
        if let Some(granted) = self
            .grants
            .write()
            .get_mut(&(principal.id.clone(), node.id.clone()))
        {
            granted.remove(&permission);
        }
        Ok(())
    }

    fn is_granted(&self, principal: &EntityRef, node: &EntityRef, permission: Permission) -> bool {
        self.grants
            .read()
            .get(&(principal.id.clone(), node.id.clone()))
            .is_some_and(|granted| granted.contains(&permission))
    }
}
