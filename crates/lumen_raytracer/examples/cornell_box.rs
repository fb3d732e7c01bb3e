//! Cornell box example.
//!
//! Renders a closed box lit by an emissive ceiling panel through the
//! background job API and saves the result as PNG.
//!
//! Usage: `cargo run --example cornell_box --release -- [options.json] [output.png]`

use std::sync::{mpsc, Arc};
use std::time::Instant;

use anyhow::{bail, Context};
use lumen_core::{Material, Mesh, Scene, Transform};
use lumen_math::{Camera, Quat, UVec2, Vec3};
use lumen_raytracer::{ImageBuffer, RaytraceOptions, Raytracer, RenderOutcome, SkyGradient};

const WIDTH: u32 = 400;
const HEIGHT: u32 = 400;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let options = match args.next() {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read options file {}", path))?;
            serde_json::from_str::<RaytraceOptions>(&text)
                .with_context(|| format!("Failed to parse options file {}", path))?
        }
        None => RaytraceOptions {
            rays_per_pixel: 64,
            ..Default::default()
        },
    };
    let output = args.next().unwrap_or_else(|| "cornell_box.png".to_string());

    let scene = build_scene()?;
    log::info!(
        "Scene '{}': {} triangles in {} instances",
        scene.name,
        scene.total_triangle_count(),
        scene.instance_count()
    );

    let camera = Camera::new(Vec3::new(0.0, 1.0, 3.4), Vec3::new(0.0, 1.0, 0.0), 1.0);

    let (tx, rx) = mpsc::channel();
    let mut raytracer = Raytracer::new(Arc::new(tx));
    raytracer.set_options(options)?;
    raytracer.set_environment(Some(Arc::new(SkyGradient::default())));

    let start = Instant::now();
    let viewport = UVec2::new(WIDTH, HEIGHT);
    raytracer.perform(&scene, &camera, viewport)?;

    let mut image = ImageBuffer::new(WIDTH, HEIGHT);
    let mut outcome = None;
    for event in rx.iter() {
        if let Some(finished) = image.apply(event) {
            outcome = Some(finished);
            break;
        }
    }
    raytracer.wait()?;

    if outcome != Some(RenderOutcome::Completed) {
        bail!("Render did not complete: {:?}", outcome);
    }
    log::info!("Rendered in {:.2?}", start.elapsed());

    image
        .save_png(&output)
        .with_context(|| format!("Failed to save {}", output))?;
    log::info!("Saved to {}", output);

    Ok(())
}

fn build_scene() -> anyhow::Result<Scene> {
    let mut scene = Scene::new("cornell_box");

    let white = scene.add_material(Material::new("white", Vec3::splat(0.73)));
    let red = scene.add_material(Material::new("red", Vec3::new(0.65, 0.05, 0.05)));
    let green = scene.add_material(Material::new("green", Vec3::new(0.12, 0.45, 0.15)));
    let light = scene.add_material(Material::emitter("light", Vec3::splat(15.0)));
    let chrome = scene.add_material(Material::mirror("chrome", Vec3::splat(0.9), 0.1));
    let glass = scene.add_material(Material::glass("glass", 1.5));

    // Walls: quads facing into the box (normal = u x v)
    let walls = [
        (Vec3::new(-1.0, 0.0, -1.0), Vec3::Z * 2.0, Vec3::X * 2.0, white, "floor"),
        (Vec3::new(-1.0, 2.0, -1.0), Vec3::X * 2.0, Vec3::Z * 2.0, white, "ceiling"),
        (Vec3::new(-1.0, 0.0, -1.0), Vec3::X * 2.0, Vec3::Y * 2.0, white, "back"),
        (Vec3::new(-1.0, 0.0, -1.0), Vec3::Y * 2.0, Vec3::Z * 2.0, red, "left"),
        (Vec3::new(1.0, 0.0, -1.0), Vec3::Z * 2.0, Vec3::Y * 2.0, green, "right"),
    ];
    for (corner, u, v, material, name) in walls {
        scene.add_mesh(Mesh::quad(corner, u, v), name, Some(material))?;
    }

    scene.add_mesh(
        Mesh::quad(Vec3::new(-0.25, 1.99, -0.25), Vec3::X * 0.5, Vec3::Z * 0.5),
        "light",
        Some(light),
    )?;

    // One prototype placed twice
    let block = scene.add_prototype(
        Arc::new(Mesh::cuboid(Vec3::new(-0.3, 0.0, -0.3), Vec3::new(0.3, 1.2, 0.3))),
        "block",
        Some(chrome),
    )?;
    scene.add_instance(
        block,
        Transform {
            translation: Vec3::new(-0.35, 0.0, -0.35),
            rotation: Quat::from_rotation_y(0.3),
            scale: Vec3::ONE,
        },
    )?;
    scene.add_instance(
        block,
        Transform {
            translation: Vec3::new(0.4, 0.0, 0.3),
            rotation: Quat::from_rotation_y(-0.3),
            scale: Vec3::new(1.0, 0.5, 1.0),
        },
    )?;

    scene.add_mesh(
        Mesh::cuboid(Vec3::new(-0.15, 0.0, 0.3), Vec3::new(0.15, 0.3, 0.6)),
        "glass_block",
        Some(glass),
    )?;

    Ok(scene)
}
