use bevy::{
    math::Affine3A,
    prelude::*,
    render::primitives::Aabb,
    tasks::{IoTaskPool, Task, block_on, futures_lite::future},
};
use std::path::{Path, PathBuf};

use crate::config::ViewerConfig;
use crate::model::document::{LoadError, VoxelModel};
use crate::model::mesh::{chunk_center, chunk_mesh};
use crate::normalize::{CameraFocus, SurfaceBounds, normalize};
use crate::scene::{AssetRoot, Part, Surface};
use crate::selection::machine::SelectionDriver;

/// Where a model comes from.
#[derive(Event, Clone, Debug)]
pub enum LoadRequest {
    Path(PathBuf),
    /// Ask the user with a native file dialog.
    Dialog,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum LoadStatus {
    #[default]
    Idle,
    Loading(String),
    Failed(String),
}

/// Name of the model on screen and the state of the latest load.
#[derive(Resource, Default, Debug)]
pub struct LoadedModel {
    pub name: Option<String>,
    pub status: LoadStatus,
}

/// One decoded chunk, meshed off the main thread.
pub struct BuiltPart {
    pub name: String,
    pub center: Vec3,
    pub mesh: Mesh,
    pub aabb: Option<Aabb>,
    pub unlit: bool,
}

pub struct LoadedDocument {
    pub name: String,
    pub parts: Vec<BuiltPart>,
}

/// The in-flight load. Only the latest request survives: replacing the task
/// drops, and so cancels, the previous one.
#[derive(Resource, Default)]
pub struct PendingLoad(Option<Task<Result<LoadedDocument, LoadError>>>);

/// A successfully loaded document waiting to replace the current parts.
#[derive(Resource, Default)]
pub struct ReadyModel(Option<LoadedDocument>);

pub struct ModelLoaderPlugin;
impl Plugin for ModelLoaderPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<LoadRequest>()
            .init_resource::<LoadedModel>()
            .init_resource::<PendingLoad>()
            .init_resource::<ReadyModel>()
            .add_systems(Startup, request_default_model)
            .add_systems(
                Update,
                (
                    open_dialog_hotkey,
                    start_loads,
                    poll_load,
                    clear_for_load,
                    spawn_ready_model,
                )
                    .chain(),
            );
    }
}

fn request_default_model(config: Res<ViewerConfig>, mut requests: EventWriter<LoadRequest>) {
    requests.write(LoadRequest::Path(config.default_model.clone()));
}

fn open_dialog_hotkey(keys: Res<ButtonInput<KeyCode>>, mut requests: EventWriter<LoadRequest>) {
    if keys.just_pressed(KeyCode::KeyO) {
        requests.write(LoadRequest::Dialog);
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".to_string())
}

/// Decode, validate and mesh a document.
pub fn build_document(bytes: &[u8], name: String) -> Result<LoadedDocument, LoadError> {
    let model = VoxelModel::decode(bytes, &name)?;
    let parts = model
        .chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let built = chunk_mesh(chunk, &model.palette);
            BuiltPart {
                name: chunk.part_name(i),
                center: chunk_center(chunk),
                mesh: built.mesh,
                aabb: built.aabb,
                unlit: chunk.unlit,
            }
        })
        .collect();
    Ok(LoadedDocument { name, parts })
}

async fn load(request: LoadRequest) -> Result<LoadedDocument, LoadError> {
    match request {
        LoadRequest::Path(path) => {
            let bytes = std::fs::read(&path).map_err(|source| LoadError::Read {
                path: path.clone(),
                source,
            })?;
            build_document(&bytes, display_name(&path))
        }
        LoadRequest::Dialog => {
            let file = rfd::AsyncFileDialog::new()
                .set_title("Open a voxel model")
                .add_filter("MagicaVoxel", &["vox"])
                .add_filter("Voxel document", &["json"])
                .pick_file()
                .await
                .ok_or(LoadError::Cancelled)?;
            let bytes = file.read().await;
            build_document(&bytes, file.file_name())
        }
    }
}

pub fn start_loads(
    mut requests: EventReader<LoadRequest>,
    mut pending: ResMut<PendingLoad>,
    mut loaded: ResMut<LoadedModel>,
) {
    let Some(request) = requests.read().last().cloned() else {
        return;
    };
    if pending.0.is_some() {
        info!("replacing the pending load");
    }
    let label = match &request {
        LoadRequest::Path(path) => display_name(path),
        LoadRequest::Dialog => "file dialog".to_string(),
    };
    info!("loading {label}");
    loaded.status = LoadStatus::Loading(label);
    pending.0 = Some(IoTaskPool::get().spawn(load(request)));
}

pub fn poll_load(
    mut pending: ResMut<PendingLoad>,
    mut loaded: ResMut<LoadedModel>,
    mut ready: ResMut<ReadyModel>,
) {
    let Some(task) = pending.0.as_mut() else {
        return;
    };
    let Some(result) = block_on(future::poll_once(task)) else {
        return;
    };
    pending.0 = None;
    accept(result, &mut loaded, &mut ready);
}

/// Route a finished load: success queues the document, failure only
/// updates the status so the scene stays as it was.
pub fn accept(
    result: Result<LoadedDocument, LoadError>,
    loaded: &mut LoadedModel,
    ready: &mut ReadyModel,
) {
    match result {
        Ok(document) => {
            info!("loaded {} ({} parts)", document.name, document.parts.len());
            ready.0 = Some(document);
        }
        Err(LoadError::Cancelled) => {
            info!("open cancelled");
            loaded.status = LoadStatus::Idle;
        }
        Err(err) => {
            error!("load failed: {err}");
            loaded.status = LoadStatus::Failed(err.to_string());
        }
    }
}

/// First half of a replacement: deselect, then drop every current part.
pub fn clear_for_load(
    mut commands: Commands,
    ready: Res<ReadyModel>,
    mut driver: SelectionDriver,
    parts: Query<(Entity, &ChildOf), With<Part>>,
) {
    if ready.0.is_none() {
        return;
    }
    driver.select(None);
    let Some(root) = driver.root() else {
        return;
    };
    for (part, parent) in &parts {
        if parent.parent() == root {
            commands.entity(part).despawn();
        }
    }
}

/// Second half: spawn the new parts, pose the root and refocus the camera.
pub fn spawn_ready_model(
    mut commands: Commands,
    mut ready: ResMut<ReadyModel>,
    config: Res<ViewerConfig>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut roots: Query<(Entity, &mut Transform), With<AssetRoot>>,
    mut loaded: ResMut<LoadedModel>,
    mut focus: EventWriter<CameraFocus>,
) {
    if ready.0.is_none() {
        return;
    }
    let Ok((root, mut root_transform)) = roots.single_mut() else {
        warn!("no asset root to load into");
        return;
    };
    let Some(document) = ready.0.take() else {
        return;
    };

    let mut bounds = Vec::new();
    for part in document.parts {
        let transform = Transform::from_translation(part.center);
        let part_entity = commands
            .spawn((
                Part,
                transform,
                Visibility::default(),
                Name::new(part.name.clone()),
                ChildOf(root),
            ))
            .id();
        // a chunk without voxels stays an empty, unpickable part
        let Some(aabb) = part.aabb else {
            continue;
        };
        let material = materials.add(StandardMaterial {
            base_color: Color::WHITE,
            unlit: part.unlit,
            perceptual_roughness: 0.9,
            ..default()
        });
        commands.spawn((
            Surface,
            Mesh3d(meshes.add(part.mesh)),
            MeshMaterial3d(material),
            Transform::IDENTITY,
            aabb,
            Name::new(format!("{}_mesh", part.name)),
            ChildOf(part_entity),
        ));
        bounds.push(SurfaceBounds {
            root_relative: Affine3A::from_translation(part.center),
            local: aabb,
        });
    }

    let result = normalize(&mut root_transform, &bounds, config.target_size);
    debug!("normalized: {result:?}");
    focus.write(CameraFocus(result.center));
    loaded.name = Some(document.name);
    loaded.status = LoadStatus::Idle;
}
