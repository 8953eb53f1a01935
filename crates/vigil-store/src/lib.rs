//! Persistent enrollments and the reservation records used to enrich results.

mod store;

pub use store::{EnrollmentInfo, FaceStore, Reservation, StoreError, EMBEDDING_DIM};
