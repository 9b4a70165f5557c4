use shomei_db::types::SignatoryType;

/// What happened to the remote side of a stored trust relationship
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConflictSituation {
    /// Remote presents a different public key than the stored one
    KeyRotated,

    /// Remote is unreachable or no longer knows the identity
    Vanished,
}

/// How a stored signatory is reconciled against its remote counterpart
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Reconciliation {
    /// Drop the stored record and store the fetched one
    Replace,

    /// Update public key and metadata in place
    Update,

    /// Forget the identity and report it as unknown
    NotFound,

    /// Refuse to resolve automatically
    Conflict,
}

/// Trust/conflict decision table
///
/// The whole matrix lives in this one match so it can be audited at a
/// glance. Trusted and static signatories exist specifically so that a
/// compromised or renamed remote cannot silently usurp an established
/// relationship; nothing about them is ever auto-resolved.
#[must_use]
pub fn reconcile(stored: SignatoryType, situation: ConflictSituation) -> Reconciliation {
    match (stored, situation) {
        (SignatoryType::Forgivable, ConflictSituation::KeyRotated) => Reconciliation::Replace,
        (SignatoryType::Forgivable, ConflictSituation::Vanished) => Reconciliation::NotFound,
        (SignatoryType::Refreshable, ConflictSituation::KeyRotated) => Reconciliation::Update,
        (SignatoryType::Refreshable, ConflictSituation::Vanished)
        | (SignatoryType::Trusted | SignatoryType::Static, _) => Reconciliation::Conflict,
    }
}
