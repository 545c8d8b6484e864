pub mod words;

pub use words::Entity as Words;
pub use words::Model as Word;
