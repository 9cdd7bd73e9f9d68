pub mod buffer_view;
pub mod pane_chrome;
pub mod status_bar;
