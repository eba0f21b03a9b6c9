//! Chart of accounts: the fixed roots plus the lazily-created per-entity
//! accounts collaborators resolve through [`account_for`].
//!
//! Layout (mirroring the institutional hierarchy):
//!
//! ```text
//! Authorities (revenue)         Payments (expense)
//! └─ <authority> allotment      └─ <authority> payment
//!
//! Establishments (asset)                    Examiners (asset)
//! └─ <establishment>                        └─ <examiner>
//!    ├─ Allotment                              ├─ Expected colles
//!    │  └─ <class>                             └─ Performed colles
//!    │     └─ <subject allotment>
//!    └─ Releases
//!       └─ <one account per release>
//! ```
//!
//! [`account_for`]: crate::Engine::account_for

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use kholle_core::{
    AccountId, AuthorityId, ClassId, ClassLevel, EstablishmentId, SubjectId, UserId,
};

/// Descriptor of an authority (rectorat), enough to lazily open its accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityRef {
    pub id: AuthorityId,
    pub name: String,
}

/// Descriptor of an establishment, including its funding authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstablishmentRef {
    pub id: EstablishmentId,
    pub name: String,
    pub authority: AuthorityRef,
}

/// Descriptor of a class. Level and enrollment feed the rate-tier
/// derivation; enrollment is read at the moment of use, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRef {
    pub id: ClassId,
    pub name: String,
    pub establishment: EstablishmentRef,
    pub level: ClassLevel,
    pub enrollment: u32,
}

/// Descriptor of a subject allotment within a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectRef {
    pub id: SubjectId,
    pub name: String,
}

/// Descriptor of an examiner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExaminerRef {
    pub id: UserId,
    pub name: String,
}

/// The entities collaborators resolve accounts for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityRef {
    Authority(AuthorityRef),
    Establishment(EstablishmentRef),
    Class(ClassRef),
    Subject { class: ClassRef, subject: SubjectRef },
    Examiner(ExaminerRef),
}

/// The four fixed top-level accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartRoots {
    pub authorities: AccountId,
    pub payments: AccountId,
    pub establishments: AccountId,
    pub examiners: AccountId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorityAccounts {
    pub allotment: AccountId,
    pub payment: AccountId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstablishmentAccounts {
    pub authority: AuthorityId,
    pub base: AccountId,
    pub allotment: AccountId,
    pub releases: AccountId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExaminerAccounts {
    pub base: AccountId,
    pub expected: AccountId,
    pub performed: AccountId,
}

/// Registry mapping institutional entities to their ledger accounts.
///
/// Pure bookkeeping: opening the accounts themselves is the engine's job.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Chart {
    roots: Option<ChartRoots>,
    authorities: HashMap<AuthorityId, AuthorityAccounts>,
    establishments: HashMap<EstablishmentId, EstablishmentAccounts>,
    classes: HashMap<ClassId, AccountId>,
    subjects: HashMap<SubjectId, AccountId>,
    examiners: HashMap<UserId, ExaminerAccounts>,
}

impl Chart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn roots(&self) -> Option<ChartRoots> {
        self.roots
    }

    pub fn set_roots(&mut self, roots: ChartRoots) {
        self.roots = Some(roots);
    }

    pub fn authority(&self, id: AuthorityId) -> Option<AuthorityAccounts> {
        self.authorities.get(&id).copied()
    }

    pub fn insert_authority(&mut self, id: AuthorityId, accounts: AuthorityAccounts) {
        self.authorities.insert(id, accounts);
    }

    pub fn establishment(&self, id: EstablishmentId) -> Option<EstablishmentAccounts> {
        self.establishments.get(&id).copied()
    }

    pub fn insert_establishment(&mut self, id: EstablishmentId, accounts: EstablishmentAccounts) {
        self.establishments.insert(id, accounts);
    }

    pub fn class(&self, id: ClassId) -> Option<AccountId> {
        self.classes.get(&id).copied()
    }

    pub fn insert_class(&mut self, id: ClassId, account: AccountId) {
        self.classes.insert(id, account);
    }

    pub fn subject(&self, id: SubjectId) -> Option<AccountId> {
        self.subjects.get(&id).copied()
    }

    pub fn insert_subject(&mut self, id: SubjectId, account: AccountId) {
        self.subjects.insert(id, account);
    }

    pub fn examiner(&self, id: UserId) -> Option<ExaminerAccounts> {
        self.examiners.get(&id).copied()
    }

    pub fn insert_examiner(&mut self, id: UserId, accounts: ExaminerAccounts) {
        self.examiners.insert(id, accounts);
    }
}
