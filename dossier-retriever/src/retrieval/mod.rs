pub mod document_index;
pub mod registry;
pub mod retriever;
