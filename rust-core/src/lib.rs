// Flight-delay insurance ledger core: deterministic, in-memory, audit-first.

pub mod bank;
pub mod config;
pub mod error;
pub mod event;
pub mod flights;
pub mod governance;
pub mod insurance;
pub mod ledger;
pub mod oracle;
pub mod registry;
pub mod surety;
pub mod tally;

pub use error::{ErrorKind, SuretyError};
pub use surety::{Call, Outcome, Receipt, Surety, Transaction};

// Time and entropy come only from the BlockContext of each transaction.

/*
Intentionally avoids:
- async
- threads
- wall clock access
- external IO outside the replay binary
*/
