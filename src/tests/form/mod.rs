mod controller_tests;
mod paste_tests;
