mod helpers;

mod cursor_tests;
mod dispatch_tests;
mod index_tests;
mod json_tests;
mod render_tests;
