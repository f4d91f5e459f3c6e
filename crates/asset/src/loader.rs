//! Async asset loading with an explicit join point.
//!
//! The mesh and its texture (or material library) are loaded as independent
//! tasks on the caller's runtime. Their completions arrive in any order and
//! are fed to an [`AssetJoin`], which hands out a [`LoadedModel`] only once the
//! mesh and everything it needs have settled.

use std::{
    collections::HashMap,
    mem,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use tokio::{io::AsyncReadExt, task::JoinSet};

use crate::{
    material::{MaterialLibrary, MaterialRef},
    mesh::{MeshAsset, MeshNode},
    mtl::parse_mtl,
    obj::{asset_name, load_obj_from_reader},
    texture::TextureData,
};

const READ_CHUNK: usize = 64 * 1024;

/// How a model and its surface appearance are found on disk.
#[derive(Clone, Debug, PartialEq)]
pub enum LoadStrategy {
    /// Loose mesh; one external texture applied to every node, or the
    /// fallback solid color for every node when `texture` is `None`.
    SingleTexture {
        mesh: PathBuf,
        texture: Option<PathBuf>,
    },
    /// Mesh plus an MTL file supplying per-node materials.
    MaterialLibrary { mesh: PathBuf, materials: PathBuf },
}

impl LoadStrategy {
    pub fn mesh_path(&self) -> &Path {
        match self {
            Self::SingleTexture { mesh, .. } | Self::MaterialLibrary { mesh, .. } => mesh,
        }
    }
}

/// A mesh with exactly one resolved material per node.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedModel {
    pub mesh: MeshAsset,
    /// Parallel to `mesh.nodes`.
    pub materials: Vec<MaterialRef>,
}

impl LoadedModel {
    pub fn nodes(&self) -> impl Iterator<Item = (&MeshNode, &MaterialRef)> {
        self.mesh.nodes.iter().zip(self.materials.iter())
    }
}

/// Outcome of one load task.
#[derive(Debug)]
pub enum Completion {
    Mesh(Result<MeshAsset>),
    Texture(Result<TextureData>),
    Materials(Result<MaterialLibrary>),
}

#[derive(Debug)]
enum Slot<T> {
    NotRequired,
    Pending,
    Ready(T),
    Failed,
}

impl<T> Slot<T> {
    fn is_settled(&self) -> bool {
        !matches!(self, Slot::Pending)
    }

    fn fill(&mut self, result: Result<T>, what: &str) {
        *self = match result {
            Ok(value) => Slot::Ready(value),
            Err(err) => {
                log::error!("Failed to load {}: {:#}", what, err);
                Slot::Failed
            }
        };
    }
}

/// Join point between the mesh load and its texture/material load.
#[derive(Debug)]
pub struct AssetJoin {
    mesh: Slot<MeshAsset>,
    texture: Slot<Arc<TextureData>>,
    materials: Slot<MaterialLibrary>,
}

impl AssetJoin {
    pub fn for_strategy(strategy: &LoadStrategy) -> Self {
        let (texture, materials) = match strategy {
            LoadStrategy::SingleTexture { texture: Some(_), .. } => {
                (Slot::Pending, Slot::NotRequired)
            }
            LoadStrategy::SingleTexture { texture: None, .. } => {
                (Slot::NotRequired, Slot::NotRequired)
            }
            LoadStrategy::MaterialLibrary { .. } => (Slot::NotRequired, Slot::Pending),
        };
        Self {
            mesh: Slot::Pending,
            texture,
            materials,
        }
    }

    /// Record a completion; failures are logged and remembered, never propagated.
    pub fn accept(&mut self, completion: Completion) {
        match completion {
            Completion::Mesh(result) => self.mesh.fill(result, "mesh"),
            Completion::Texture(result) => {
                if matches!(self.texture, Slot::NotRequired) {
                    log::warn!("Ignoring texture that no node asked for");
                    return;
                }
                self.texture.fill(result.map(Arc::new), "texture");
            }
            Completion::Materials(result) => {
                if matches!(self.materials, Slot::NotRequired) {
                    log::warn!("Ignoring material library that no node asked for");
                    return;
                }
                self.materials.fill(result, "material library");
            }
        }
    }

    pub fn mesh_failed(&self) -> bool {
        matches!(self.mesh, Slot::Failed)
    }

    /// Mesh arrived and every companion load has either arrived or failed.
    pub fn is_ready(&self) -> bool {
        matches!(self.mesh, Slot::Ready(_)) && self.texture.is_settled() && self.materials.is_settled()
    }

    /// Treat companion loads that will never report as failed.
    pub fn abandon_pending(&mut self) {
        if matches!(self.texture, Slot::Pending) {
            self.texture = Slot::Failed;
        }
        if matches!(self.materials, Slot::Pending) {
            self.materials = Slot::Failed;
        }
    }

    /// Take the joined model once [`is_ready`](Self::is_ready) holds.
    pub fn take_ready(&mut self) -> Option<LoadedModel> {
        if !self.is_ready() {
            return None;
        }
        let Slot::Ready(mesh) = mem::replace(&mut self.mesh, Slot::Pending) else {
            return None;
        };

        let materials = mesh
            .nodes
            .iter()
            .map(|node| match (&self.texture, &self.materials) {
                (Slot::Ready(texture), _) => MaterialRef::textured(Arc::clone(texture)),
                (_, Slot::Ready(library)) => library.resolve(node.material.as_deref()),
                _ => MaterialRef::fallback(),
            })
            .collect();

        Some(LoadedModel { mesh, materials })
    }
}

/// Read a whole file, reporting a monotonic completion fraction that ends at 1.0.
pub async fn read_with_progress<F>(path: &Path, on_progress: &mut F) -> Result<Vec<u8>>
where
    F: FnMut(f32),
{
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let total = file
        .metadata()
        .await
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();

    let mut data = Vec::with_capacity(total as usize);
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut last = 0.0f32;
    loop {
        let n = file
            .read(&mut chunk)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&chunk[..n]);
        if total > 0 {
            let fraction = (data.len() as f64 / total as f64).min(1.0) as f32;
            if fraction > last {
                last = fraction;
                on_progress(fraction);
            }
        }
    }
    if last < 1.0 {
        on_progress(1.0);
    }
    Ok(data)
}

/// Load and parse an OBJ mesh.
pub async fn load_mesh<F>(path: &Path, mut on_progress: F) -> Result<MeshAsset>
where
    F: FnMut(f32),
{
    let bytes = read_with_progress(path, &mut on_progress).await?;
    let mut mesh = load_obj_from_reader(bytes.as_slice())
        .with_context(|| format!("Failed to parse OBJ {}", path.display()))?;
    mesh.name = asset_name(path);
    log::info!(
        "Loaded mesh '{}': {} nodes, {} vertices, {} triangles",
        mesh.name,
        mesh.nodes.len(),
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

/// Load and decode a texture image.
pub async fn load_texture(path: &Path) -> Result<TextureData> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read texture {}", path.display()))?;
    TextureData::from_encoded(&bytes).with_context(|| format!("Texture {}", path.display()))
}

/// Load an MTL file and preload every diffuse map it references.
///
/// A map that fails to load degrades its material to the diffuse color.
pub async fn load_materials(path: &Path) -> Result<MaterialLibrary> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read material library {}", path.display()))?;
    let materials = parse_mtl(&contents)
        .with_context(|| format!("Failed to parse MTL {}", path.display()))?;

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    let mut textures: HashMap<String, Arc<TextureData>> = HashMap::new();
    for map in materials.iter().filter_map(|m| m.diffuse_map.as_ref()) {
        if textures.contains_key(map) {
            continue;
        }
        match load_texture(&base.join(map)).await {
            Ok(texture) => {
                textures.insert(map.clone(), Arc::new(texture));
            }
            Err(err) => log::warn!("Material map '{}' unavailable: {:#}", map, err),
        }
    }

    let library = MaterialLibrary::from_mtl(materials, &textures);
    log::info!(
        "Loaded material library {} ({} materials, {} textures)",
        path.display(),
        library.len(),
        textures.len()
    );
    Ok(library)
}

/// Load everything a strategy names and join it into a model.
///
/// Returns `None` when the mesh cannot be loaded; the session then renders
/// without it. Must be called from within a tokio runtime.
pub async fn load_assets<F>(strategy: &LoadStrategy, on_progress: F) -> Option<LoadedModel>
where
    F: FnMut(f32) + Send + 'static,
{
    let mut join = AssetJoin::for_strategy(strategy);
    let mut tasks = JoinSet::new();

    let mesh_path = strategy.mesh_path().to_path_buf();
    tasks.spawn(async move { Completion::Mesh(load_mesh(&mesh_path, on_progress).await) });

    match strategy {
        LoadStrategy::SingleTexture {
            texture: Some(path),
            ..
        } => {
            let path = path.clone();
            tasks.spawn(async move { Completion::Texture(load_texture(&path).await) });
        }
        LoadStrategy::SingleTexture { texture: None, .. } => {}
        LoadStrategy::MaterialLibrary { materials, .. } => {
            let path = materials.clone();
            tasks.spawn(async move { Completion::Materials(load_materials(&path).await) });
        }
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(completion) => join.accept(completion),
            Err(err) => log::error!("Asset load task aborted: {}", err),
        }
        if let Some(model) = join.take_ready() {
            return Some(model);
        }
    }

    join.abandon_pending();
    let model = join.take_ready();
    if model.is_none() {
        log::error!(
            "Model {} unavailable; continuing without it",
            strategy.mesh_path().display()
        );
    }
    model
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obj::load_obj_from_str;
    use std::sync::Mutex;

    const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("modelview-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_png(path: &Path, rgba: [u8; 4]) {
        image::RgbaImage::from_pixel(2, 2, image::Rgba(rgba))
            .save(path)
            .unwrap();
    }

    fn textured_strategy() -> LoadStrategy {
        LoadStrategy::SingleTexture {
            mesh: "spot.obj".into(),
            texture: Some("spot.png".into()),
        }
    }

    #[test]
    fn join_is_order_independent() {
        let mesh = || Completion::Mesh(load_obj_from_str(TRIANGLE));
        let texture = || Completion::Texture(Ok(TextureData::solid([1, 2, 3])));

        let mut mesh_first = AssetJoin::for_strategy(&textured_strategy());
        mesh_first.accept(mesh());
        assert!(mesh_first.take_ready().is_none());
        mesh_first.accept(texture());
        let a = mesh_first.take_ready().expect("joined");

        let mut texture_first = AssetJoin::for_strategy(&textured_strategy());
        texture_first.accept(texture());
        assert!(texture_first.take_ready().is_none());
        texture_first.accept(mesh());
        let b = texture_first.take_ready().expect("joined");

        assert_eq!(a, b);
        assert!(a.materials.iter().all(MaterialRef::is_textured));
        assert_eq!(a.materials.len(), a.mesh.nodes.len());
    }

    #[test]
    fn material_join_is_order_independent() {
        let strategy = LoadStrategy::MaterialLibrary {
            mesh: "male.obj".into(),
            materials: "male.mtl".into(),
        };
        let mesh = || {
            Completion::Mesh(load_obj_from_str(
                "v 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl skin\nf 1 2 3\nusemtl nope\nf 1 3 2\n",
            ))
        };
        let library = || {
            let mtl = parse_mtl("newmtl skin\nKd 0.5 0.25 1\n").unwrap();
            Completion::Materials(Ok(MaterialLibrary::from_mtl(mtl, &HashMap::new())))
        };

        let mut mesh_first = AssetJoin::for_strategy(&strategy);
        mesh_first.accept(mesh());
        assert!(mesh_first.take_ready().is_none());
        mesh_first.accept(library());
        let a = mesh_first.take_ready().expect("joined");

        let mut materials_first = AssetJoin::for_strategy(&strategy);
        materials_first.accept(library());
        assert!(materials_first.take_ready().is_none());
        materials_first.accept(mesh());
        let b = materials_first.take_ready().expect("joined");

        assert_eq!(a, b);
        assert_eq!(
            a.materials,
            vec![
                MaterialRef::Solid { color: [0.5, 0.25, 1.0] },
                MaterialRef::fallback(),
            ]
        );
    }

    #[test]
    fn model_is_handed_out_once() {
        let mut join = AssetJoin::for_strategy(&LoadStrategy::SingleTexture {
            mesh: "m.obj".into(),
            texture: None,
        });
        join.accept(Completion::Mesh(load_obj_from_str(TRIANGLE)));
        let model = join.take_ready().expect("no texture required");
        assert_eq!(model.materials, vec![MaterialRef::fallback()]);
        assert!(join.take_ready().is_none());
    }

    #[test]
    fn failed_texture_degrades_to_fallback() {
        let mut join = AssetJoin::for_strategy(&textured_strategy());
        join.accept(Completion::Texture(Err(anyhow::anyhow!("404"))));
        join.accept(Completion::Mesh(load_obj_from_str(TRIANGLE)));
        let model = join.take_ready().unwrap();
        assert_eq!(model.materials, vec![MaterialRef::fallback()]);
    }

    #[test]
    fn failed_mesh_never_joins() {
        let mut join = AssetJoin::for_strategy(&textured_strategy());
        join.accept(Completion::Mesh(Err(anyhow::anyhow!("truncated"))));
        join.accept(Completion::Texture(Ok(TextureData::solid([0, 0, 0]))));
        assert!(join.mesh_failed());
        join.abandon_pending();
        assert!(join.take_ready().is_none());
    }

    #[tokio::test]
    async fn mesh_progress_is_monotonic_and_complete() {
        let dir = scratch_dir("progress");
        let path = dir.join("big.obj");
        let mut src = String::new();
        for i in 0..20_000 {
            src.push_str(&format!("v {i} 0 0\n"));
        }
        src.push_str("f 1 2 3\n");
        std::fs::write(&path, src).unwrap();

        let mut seen = Vec::new();
        let mesh = load_mesh(&path, |p| seen.push(p)).await.unwrap();
        assert_eq!(mesh.name, "big");
        assert!(seen.len() > 1);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert!(seen.iter().all(|p| (0.0..=1.0).contains(p)));
        assert_eq!(*seen.last().unwrap(), 1.0);
    }

    #[tokio::test]
    async fn loads_single_texture_model() {
        let dir = scratch_dir("single");
        std::fs::write(dir.join("tri.obj"), TRIANGLE).unwrap();
        write_png(&dir.join("tex.png"), [10, 20, 30, 255]);

        let progress = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&progress);
        let strategy = LoadStrategy::SingleTexture {
            mesh: dir.join("tri.obj"),
            texture: Some(dir.join("tex.png")),
        };
        let model = load_assets(&strategy, move |p| sink.lock().unwrap().push(p))
            .await
            .expect("model");

        assert!(model.materials.iter().all(MaterialRef::is_textured));
        assert_eq!(progress.lock().unwrap().last().copied(), Some(1.0));
    }

    #[tokio::test]
    async fn loads_material_library_model() {
        let dir = scratch_dir("mtl");
        std::fs::write(
            dir.join("male.obj"),
            "mtllib male.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl skin\nf 1 2 3\nusemtl cloth\nf 1 3 2\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("male.mtl"),
            "newmtl skin\nKd 1 1 1\nmap_Kd skin.png\nnewmtl cloth\nKd 0 0 1\n",
        )
        .unwrap();
        write_png(&dir.join("skin.png"), [200, 150, 120, 255]);

        let strategy = LoadStrategy::MaterialLibrary {
            mesh: dir.join("male.obj"),
            materials: dir.join("male.mtl"),
        };
        let model = load_assets(&strategy, |_| {}).await.expect("model");
        assert_eq!(model.mesh.nodes.len(), 2);
        assert!(model.materials[0].is_textured());
        assert_eq!(model.materials[1], MaterialRef::Solid { color: [0.0, 0.0, 1.0] });
    }

    #[tokio::test]
    async fn missing_mesh_yields_none() {
        let dir = scratch_dir("missing");
        write_png(&dir.join("tex.png"), [0, 0, 0, 255]);
        let strategy = LoadStrategy::SingleTexture {
            mesh: dir.join("nope.obj"),
            texture: Some(dir.join("tex.png")),
        };
        assert!(load_assets(&strategy, |_| {}).await.is_none());
    }

    #[tokio::test]
    async fn missing_texture_still_yields_model() {
        let dir = scratch_dir("notex");
        std::fs::write(dir.join("tri.obj"), TRIANGLE).unwrap();
        let strategy = LoadStrategy::SingleTexture {
            mesh: dir.join("tri.obj"),
            texture: Some(dir.join("nope.png")),
        };
        let model = load_assets(&strategy, |_| {}).await.expect("model");
        assert_eq!(model.materials, vec![MaterialRef::fallback()]);
    }
}
