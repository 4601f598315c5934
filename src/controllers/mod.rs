pub mod governor;
