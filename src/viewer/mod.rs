mod controller;

pub use controller::{ViewerController, ViewerSnapshot};
