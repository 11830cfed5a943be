pub(crate) mod support;

mod app;
mod form;
mod popup;
mod presentation;
