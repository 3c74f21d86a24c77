// Configuration (file + environment)
pub mod config;

// Error taxonomy shared by the auth and proxy paths
pub mod error;

// Bounded expiring key sets backing states, codes and sessions
pub mod cache;

// Credential persistence
pub mod credentials;

// OAuth provider, code exchange and callback bookkeeping
pub mod oauth;

// Browser session markers
pub mod session;

// Access token lifecycle
pub mod token;

// Spotify Web API pass-through
pub mod proxy;

// HTTP routes
pub mod api;

// Service wiring
pub mod app;
