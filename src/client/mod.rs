mod rawsession;
mod session;
mod transfer;
mod tree;

pub use self::{
    rawsession::{Direction, RawSession, State},
    session::Session,
    transfer::Progress,
    tree::{FailureReason, RemovalFailure, RemovalReport},
};
