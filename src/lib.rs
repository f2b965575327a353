pub mod cloudinary;
pub mod error;
pub mod models;
pub mod routes;
pub mod session;
pub mod state;
