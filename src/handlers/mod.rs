// Handlers by security tier:
// public (no bearer token) and protected (security context from the bearer token)
pub mod protected;
pub mod public;
