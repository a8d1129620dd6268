pub mod io;

pub use io::read_token_from_stdin;
