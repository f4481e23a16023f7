pub mod interviewee;
pub mod query;
pub mod session;

pub use interviewee::{InterviewDetail, IntervieweeCandidate, LogEntry};
pub use query::ExtractedQuery;
pub use session::{Credential, SessionToken};
