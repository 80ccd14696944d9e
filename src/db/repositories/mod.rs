mod interactions;
mod sessions;
