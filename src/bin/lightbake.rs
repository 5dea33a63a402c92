use clap::{ArgMatches, Command, arg, value_parser};
use lightbaker::prelude::*;
use log::info;
use std::path::PathBuf;
use vek::Vec3;

fn cli() -> Command {
    Command::new("lightbake")
        .about("Progressive lightmap baker.")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(arg!(<FILE> "Input '.obj' mesh with lightmap UVs"))
        .arg(arg!(-a --albedo <IMAGE> "Albedo texture modulating bounced light"))
        .arg(arg!(-c --config <TOML> "Settings file with a [bake] section"))
        .arg(arg!(-r --resolution <RES> "Lightmap resolution (WIDTHxHEIGHT)"))
        .arg(arg!(--rays <COUNT> "Rays per texel and step").value_parser(value_parser!(u32)))
        .arg(
            arg!(-i --iterations <COUNT> "Number of iterations")
                .value_parser(value_parser!(u32)),
        )
        .arg(arg!(-m --mode <MODE> "indirect, ao or directional"))
        .arg(arg!(--"brute-force" "Test every triangle instead of using a BVH"))
        .arg(arg!(--seed <SEED> "Seed of the random stream").value_parser(value_parser!(u64)))
        .arg(arg!(-o --output <PNG> "Output image").default_value("lightmap.png"))
}

fn main() {
    env_logger::init();

    let matches = cli().get_matches();
    if let Err(err) = run(&matches) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run(matches: &ArgMatches) -> lightbaker::Result<()> {
    let settings = settings(matches)?;

    let input = matches
        .get_one::<String>("FILE")
        .map(PathBuf::from)
        .ok_or_else(|| BakeError::Settings("no input file".into()))?;
    let mesh = lightbaker::wavefront::parse_file(&input)?;
    info!(
        "Loaded {} with {} triangles",
        input.display(),
        mesh.triangle_count()
    );

    let mut scene = Scene::new(&mesh, settings)?;
    if let Some(albedo) = matches.get_one::<String>("albedo") {
        scene.load_albedo(albedo)?;
    }
    if scene.settings().mode == BakeMode::Indirect {
        let direction = Vec3::<f32>::from(scene.settings().light_direction);
        scene.prime_direct_light(direction);
        info!("Primed direct light along {direction:?}");
    }

    let start = instant::Instant::now();
    loop {
        match scene.step() {
            StepOutcome::Baked {
                iteration, budget, ..
            } => {
                println!(
                    "Iteration {}/{} ({:.0}%)",
                    iteration + 1,
                    budget,
                    scene.progress() * 100.0
                );
            }
            StepOutcome::Finished | StepOutcome::Idle => break,
        }
    }
    println!("Baked in {:.2}s", start.elapsed().as_secs_f32());

    let output = matches
        .get_one::<String>("output")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("lightmap.png"));
    scene.lightmap().save_png(&output)?;
    println!("Saved {}", output.display());
    Ok(())
}

/// Defaults, overlaid with the config file, overlaid with the command line.
fn settings(matches: &ArgMatches) -> lightbaker::Result<BakeSettings> {
    let mut settings = match matches.get_one::<String>("config") {
        Some(path) => BakeSettings::from_file(path)?,
        None => BakeSettings::default(),
    };

    if let Some(resolution) = matches.get_one::<String>("resolution") {
        let (width, height) = parse_resolution(resolution).ok_or_else(|| {
            BakeError::Settings(format!("invalid resolution '{resolution}', expected WxH"))
        })?;
        settings.width = width;
        settings.height = height;
    }
    if let Some(rays) = matches.get_one::<u32>("rays") {
        settings.rays_per_texel = *rays;
    }
    if let Some(iterations) = matches.get_one::<u32>("iterations") {
        settings.iterations = *iterations;
    }
    if let Some(mode) = matches.get_one::<String>("mode") {
        settings.mode = match mode.as_str() {
            "indirect" => BakeMode::Indirect,
            "ao" => BakeMode::AmbientOcclusion,
            "directional" => BakeMode::Directional,
            other => return Err(BakeError::Settings(format!("unknown mode '{other}'"))),
        };
    }
    if matches.get_flag("brute-force") {
        settings.intersector = IntersectorKind::BruteForce;
    }
    if let Some(seed) = matches.get_one::<u64>("seed") {
        settings.seed = Some(*seed);
    }

    Ok(settings)
}

fn parse_resolution(text: &str) -> Option<(usize, usize)> {
    let (w, h) = text.split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}
