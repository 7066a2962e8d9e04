pub mod background_encode;
