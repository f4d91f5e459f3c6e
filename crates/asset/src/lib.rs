//! Asset loading/parsers (meshes, materials, textures).
//! OBJ meshes split into drawable nodes, MTL material libraries, RGBA8 textures,
//! and the async loader that joins a mesh with its texture or materials.

pub mod loader;
pub mod material;
pub mod mesh;
pub mod mtl;
pub mod obj;
pub mod texture;

pub use loader::{AssetJoin, Completion, LoadStrategy, LoadedModel, load_assets};
pub use material::{MaterialLibrary, MaterialRef};
pub use mesh::{MeshAsset, MeshData, MeshNode, MeshVertex};
pub use texture::TextureData;
