//! Domain logic of the overview: decryption, aggregation, projection and mutation

pub mod aggregate;
pub mod decrypt;
pub mod environment;
pub mod event;
pub mod fetch;
pub mod folder;
pub mod matrix;
pub mod mutation;
pub mod presence;
pub mod secret;
