//! A single demo frame driving every pipeline mode.
//!
//! Lighting is refreshed in `update`; `draw` walks the field, the lit models,
//! three cubes with one filter mode each, and finally the 2D UI. Every draw
//! submission goes to the caller's sink.

use glam::{Mat4, Vec3, Vec4};
use shadekit_assets::{AssetError, TextureId, TextureStore};
use shadekit_common::{FilterMode, palette};
use shadekit_render::{GraphicsDevice, PipelineManager};

pub const SCREEN_WIDTH: f32 = 1920.0;
pub const SCREEN_HEIGHT: f32 = 1080.0;
const UI_SIZE: f32 = 50.0;

pub const PLAYER_START: Vec3 = Vec3::new(0.0, 5.0, -5.0);

/// Every texture the scene binds.
pub const TEXTURE_NAMES: [&str; 9] = [
    "field_a", "field_b", "player", "billboard", "car", "cube", "ball", "Aim", "HP",
];

/// Cube x offset and the filter it is sampled with.
const CUBES: [(f32, FilterMode); 3] = [
    (0.0, FilterMode::Point),
    (1.5, FilterMode::Linear),
    (3.0, FilterMode::Anisotropic),
];

/// Screen-space rectangle in pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Places a unit quad over this rectangle.
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_translation(Vec3::new(self.x, self.y, 0.0))
            * Mat4::from_scale(Vec3::new(self.width, self.height, 1.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UiLayout {
    pub aim: Rect,
    pub hp: Rect,
}

impl UiLayout {
    /// Crosshair centered; HP bar ten units wide in the bottom-right corner.
    pub fn new(width: f32, height: f32, size: f32) -> Self {
        Self {
            aim: Rect {
                x: width * 0.5 - size * 0.5,
                y: height * 0.5 - size * 0.5,
                width: size,
                height: size,
            },
            hp: Rect {
                x: width - size * 10.0,
                y: height - size * 1.5,
                width: size * 10.0,
                height: size * 1.5,
            },
        }
    }
}

/// Pixel coordinates to clip space, y down.
pub fn screen_projection(width: f32, height: f32) -> Mat4 {
    Mat4::orthographic_lh(0.0, width, height, 0.0, 0.0, 1.0)
}

#[derive(Debug, Clone, Copy)]
struct SceneTextures {
    field: [TextureId; 2],
    player: TextureId,
    billboard: TextureId,
    car: TextureId,
    cube: TextureId,
    ball: TextureId,
    aim: TextureId,
    hp: TextureId,
}

#[derive(Debug, Clone)]
pub struct DemoScene {
    textures: SceneTextures,
    ui: UiLayout,
    player: Vec3,
}

impl DemoScene {
    /// Resolves every texture id up front; fails if one is not registered.
    pub fn new<V>(store: &TextureStore<V>) -> Result<Self, AssetError> {
        let textures = SceneTextures {
            field: [store.require("field_a")?, store.require("field_b")?],
            player: store.require("player")?,
            billboard: store.require("billboard")?,
            car: store.require("car")?,
            cube: store.require("cube")?,
            ball: store.require("ball")?,
            aim: store.require("Aim")?,
            hp: store.require("HP")?,
        };
        Ok(Self {
            textures,
            ui: UiLayout::new(SCREEN_WIDTH, SCREEN_HEIGHT, UI_SIZE),
            player: PLAYER_START,
        })
    }

    pub fn ui(&self) -> &UiLayout {
        &self.ui
    }

    pub fn player_position(&self) -> Vec3 {
        self.player
    }

    pub fn set_player_position(&mut self, position: Vec3) {
        self.player = position;
    }

    /// Third-person eye behind and above the player.
    pub fn camera_eye(&self) -> Vec3 {
        self.player + Vec3::new(0.0, 1.5, -4.0)
    }

    /// Per-update camera and lighting.
    pub fn update<D: GraphicsDevice>(&self, manager: &mut PipelineManager<D>) {
        let eye = self.camera_eye();
        manager.set_view_matrix_3d(Mat4::look_at_lh(eye, self.player + Vec3::Y, Vec3::Y));
        manager.set_projection_matrix_3d(Mat4::perspective_lh(
            60f32.to_radians(),
            SCREEN_WIDTH / SCREEN_HEIGHT,
            0.1,
            1000.0,
        ));

        manager.set_light_ambient(Vec4::new(0.1, 0.1, 0.1, 1.0));
        manager.set_light_directional(
            Vec4::new(0.0, -1.0, 0.0, 0.0),
            Vec4::new(0.8, 0.8, 0.8, 1.0),
        );
        manager.set_light_specular(eye, 32.0, Vec4::new(0.2, 0.2, 0.2, 1.0));
        manager.set_diffuse_color(palette::WHITE);

        manager.set_point_light_count(4);
        manager.set_point_light(0, self.player + Vec3::Y, 3.0, palette::ORANGE);
        manager.set_point_light(1, Vec3::new(0.0, 1.0, 0.0), 1.0, palette::RED.with_w(5.0));
        manager.set_point_light(2, Vec3::new(1.5, 1.0, 0.0), 1.0, palette::GREEN.with_w(5.0));
        manager.set_point_light(3, Vec3::new(3.0, 1.0, 0.0), 1.0, palette::BLUE.with_w(5.0));
    }

    /// Issues the whole frame. `sink` is called once per draw, after the
    /// pipeline state for that draw is complete.
    pub fn draw<D, F>(
        &self,
        manager: &mut PipelineManager<D>,
        store: &TextureStore<D::TextureView>,
        mut sink: F,
    ) -> Result<(), AssetError>
    where
        D: GraphicsDevice,
        F: FnMut(&mut PipelineManager<D>, &str),
    {
        let texture = |id: TextureId| {
            store.get(id).ok_or_else(|| {
                AssetError::NotFound(store.name(id).unwrap_or("unknown").to_string())
            })
        };
        let t = &self.textures;

        manager.begin_3d_field(FilterMode::Linear);
        manager.set_world_matrix_3d(Mat4::IDENTITY);
        manager.set_field_textures(texture(t.field[0])?, texture(t.field[1])?);
        sink(manager, "field");

        manager.begin_3d(FilterMode::Linear);
        manager.set_world_matrix_3d(Mat4::from_translation(self.player));
        manager.set_texture_3d(texture(t.player)?);
        sink(manager, "player");

        manager.set_world_matrix_3d(Mat4::from_translation(Vec3::new(-5.0, 0.5, -5.0)));
        manager.set_texture_3d(texture(t.billboard)?);
        sink(manager, "billboard");

        // Rotated half a turn about Z, then moved.
        let car = Mat4::from_translation(Vec3::new(-3.0, 0.0, 3.0))
            * Mat4::from_rotation_z(180f32.to_radians());
        manager.set_world_matrix_3d(car);
        manager.set_texture_3d(texture(t.car)?);
        sink(manager, "car");

        for (x, filter) in CUBES {
            manager.begin_3d(filter);
            manager.set_world_matrix_3d(Mat4::from_translation(Vec3::new(x, 0.0, 0.0)));
            manager.set_texture_3d(texture(t.cube)?);
            sink(manager, &format!("cube_{}", filter.name()));

            manager.set_world_matrix_3d(Mat4::from_translation(Vec3::new(x, 1.0, 0.0)));
            manager.set_texture_3d(texture(t.ball)?);
            sink(manager, "ball");
        }

        manager.begin_2d(FilterMode::Point);
        manager.set_projection_matrix_2d(screen_projection(SCREEN_WIDTH, SCREEN_HEIGHT));
        manager.set_world_matrix_2d(self.ui.aim.world_matrix());
        manager.set_texture_2d(texture(t.aim)?);
        sink(manager, "ui_aim");

        manager.set_world_matrix_2d(self.ui.hp.world_matrix());
        manager.set_texture_2d(texture(t.hp)?);
        sink(manager, "ui_hp");

        Ok(())
    }
}

/// Registers a recording-device texture under every name the scene uses.
pub fn register_recording_textures(
    device: &mut shadekit_render::RecordingDevice,
    store: &mut TextureStore<shadekit_render::ObjectId>,
) -> Result<(), AssetError> {
    for name in TEXTURE_NAMES {
        let view = device.create_texture(name);
        store.register(name, view)?;
    }
    Ok(())
}
