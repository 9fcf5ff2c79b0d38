//! Client-side, offline-capable cache for a remote document database,
//! modeled on the Firestore client's `LocalStore`.

pub mod firestore;
