/// Router Module Index
///
/// Organizes the routing logic into security-segregated modules so access
/// control is applied explicitly at the module level rather than per-route:
///
/// - `public`: open endpoints (enlistment, login, health).
/// - `authenticated`: read-only queries and session management; every
///   handler resolves an `AuthSoldier` and rejects unauthenticated callers.
/// - `manager`: mutating endpoints additionally gated on the caller's
///   manager flag inside the handler.

/// Open endpoints: soldier enlistment, credential login, health probe.
pub mod public;

/// Endpoints requiring a validated session token.
pub mod authenticated;

/// Endpoints requiring a validated session *and* the manager role.
pub mod manager;
