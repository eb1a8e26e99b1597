pub mod config;
pub mod error;
pub mod graph;

pub use error::{ConfigError, GatewayError};
pub use graph::{
    Auth, Candidate, CandidateHealth, CandidateRuntimeStatus, Graph, Provider, Route,
    SchedulerState, Service, Strategy, User, UserServiceRoute,
};
