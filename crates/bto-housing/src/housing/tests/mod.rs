mod common;

mod lifecycle;
mod projects;
mod routing;
