//! Operations and capability bitmasks

use std::fmt;
use std::ops::BitOr;

/// A generic operation the dispatcher forwards to a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operation {
    List,
    Create,
    Delete,
    Get,
    Action,
}

impl Operation {
    /// Every operation, in bit order
    pub const ALL: [Operation; 5] = [
        Operation::List,
        Operation::Create,
        Operation::Delete,
        Operation::Get,
        Operation::Action,
    ];

    /// Bit of this operation in an [`Operations`] mask
    pub const fn bit(self) -> u8 {
        match self {
            Operation::List => 1,
            Operation::Create => 2,
            Operation::Delete => 4,
            Operation::Get => 8,
            Operation::Action => 16,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Create => "create",
            Operation::Delete => "delete",
            Operation::Get => "get",
            Operation::Action => "action",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of operations a resource kind supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Operations(u8);

impl Operations {
    pub const NONE: Operations = Operations(0);
    pub const LIST: Operations = Operations(Operation::List.bit());
    pub const CREATE: Operations = Operations(Operation::Create.bit());
    pub const DELETE: Operations = Operations(Operation::Delete.bit());
    pub const GET: Operations = Operations(Operation::Get.bit());
    pub const ACTION: Operations = Operations(Operation::Action.bit());

    /// List, create, delete and get
    pub const CRUD: Operations = Operations::LIST
        .union(Operations::CREATE)
        .union(Operations::DELETE)
        .union(Operations::GET);

    /// Combine two masks (usable in consts)
    pub const fn union(self, other: Operations) -> Operations {
        Operations(self.0 | other.0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, operation: Operation) -> bool {
        self.0 & operation.bit() != 0
    }

    /// Operations in the mask, in bit order
    pub fn iter(self) -> impl Iterator<Item = Operation> {
        Operation::ALL.into_iter().filter(move |op| self.contains(*op))
    }
}

impl BitOr for Operations {
    type Output = Operations;

    fn bitor(self, rhs: Operations) -> Operations {
        self.union(rhs)
    }
}

impl From<Operation> for Operations {
    fn from(operation: Operation) -> Self {
        Operations(operation.bit())
    }
}

impl fmt::Display for Operations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|op| op.as_str()).collect();
        write!(f, "{}", names.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_values() {
        assert_eq!(Operations::LIST.bits(), 1);
        assert_eq!(Operations::CREATE.bits(), 2);
        assert_eq!(Operations::DELETE.bits(), 4);
        assert_eq!(Operations::GET.bits(), 8);
        assert_eq!(Operations::ACTION.bits(), 16);
        assert_eq!(Operations::CRUD.bits(), 15);
    }

    #[test]
    fn test_contains_and_iter() {
        let ops = Operations::LIST | Operations::ACTION;
        assert!(ops.contains(Operation::List));
        assert!(ops.contains(Operation::Action));
        assert!(!ops.contains(Operation::Create));
        assert_eq!(ops.iter().collect::<Vec<_>>(), vec![Operation::List, Operation::Action]);
        assert_eq!(ops.to_string(), "list|action");
        assert_eq!(Operations::NONE.iter().count(), 0);
    }
}
