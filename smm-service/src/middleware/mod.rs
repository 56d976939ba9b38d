pub mod caller;

pub use caller::{AdminContext, CallerContext, USER_ID_HEADER, USER_ROLE_HEADER};
