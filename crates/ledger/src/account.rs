use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use kholle_core::{AccountId, Entity, Hours, UserId, ValueObject};

/// High-level account category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountCategory {
    Expense,
    Asset,
    Revenue,
    Liability,
    Equity,
}

/// Accounting role group, used for hierarchy compatibility checks.
///
/// Funding (revenue) and spending (expense) subtrees never mix with each
/// other or with the balance-sheet subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountRole {
    Revenue,
    Expense,
    Balance,
}

impl AccountCategory {
    /// Presentation sign: revenue and liability accounts are conventionally
    /// displayed inverted. Storage is always debit-negative/credit-positive;
    /// this rule belongs to read models only.
    pub fn display_sign(self) -> i64 {
        match self {
            AccountCategory::Revenue | AccountCategory::Liability => -1,
            _ => 1,
        }
    }

    pub fn role(self) -> AccountRole {
        match self {
            AccountCategory::Revenue => AccountRole::Revenue,
            AccountCategory::Expense => AccountRole::Expense,
            AccountCategory::Asset | AccountCategory::Liability | AccountCategory::Equity => {
                AccountRole::Balance
            }
        }
    }

    /// Whether an account of this category may be created under a parent of
    /// the given category.
    pub fn nests_under(self, parent: AccountCategory) -> bool {
        self.role() == parent.role()
    }
}

/// Per-account overdraft policy.
///
/// The limit components are stored as positive magnitudes and are meaningful
/// only when `allowed` is true; a disallowed overdraft behaves as a limit of
/// exactly zero. An allowed overdraft with no explicit limit is unbounded
/// (funding roots hand out hours without ever holding any).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdraftPolicy {
    pub allowed: bool,
    pub limit: Option<Hours>,
}

impl OverdraftPolicy {
    pub const FORBIDDEN: OverdraftPolicy = OverdraftPolicy {
        allowed: false,
        limit: None,
    };

    pub fn unlimited() -> Self {
        OverdraftPolicy {
            allowed: true,
            limit: None,
        }
    }

    pub fn allowing(limit: Hours) -> Self {
        OverdraftPolicy {
            allowed: true,
            limit: Some(limit),
        }
    }

    /// The floor the account's subtree balance must never fall below, or
    /// `None` when the account is unconstrained.
    pub fn floor(&self) -> Option<Hours> {
        if self.allowed {
            self.limit.map(|l| -l)
        } else {
            Some(Hours::ZERO)
        }
    }
}

impl ValueObject for OverdraftPolicy {}

/// A node in the account tree.
///
/// Every account except roots has exactly one parent, fixed at creation:
/// cycles are structurally impossible. Managers are an authorization set,
/// not ownership; examiners manage their own hour accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub parent: Option<AccountId>,
    pub category: AccountCategory,
    pub managers: HashSet<UserId>,
    pub overdraft: OverdraftPolicy,
}

impl Account {
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn managed_by(&self, user: UserId) -> bool {
        self.managers.contains(&user)
    }
}

impl Entity for Account {
    type Id = AccountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
