mod pcd_header;
pub use self::pcd_header::*;

mod pcd_metadata;
pub use self::pcd_metadata::*;

mod pcd_reader;
pub use self::pcd_reader::*;

mod pcd_writer;
pub use self::pcd_writer::*;
