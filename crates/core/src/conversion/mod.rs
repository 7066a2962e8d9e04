pub mod color_space;
