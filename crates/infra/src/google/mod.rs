//! Google Calendar provider integration.

pub mod gateway;

pub use gateway::GoogleCalendarGateway;
