mod auth;
mod helpers;
mod incidents;
mod orders;
