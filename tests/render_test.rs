#[cfg(feature = "integration-tests")]
mod common;

#[cfg(feature = "integration-tests")]
mod gpu {
    use tess_demo::{DemoConfig, flow::CAMERA_START, pipelines::state::FillMode};

    use crate::common::{HEIGHT, Offscreen, WIDTH};

    fn centre(img: &image::RgbaImage) -> image::Rgba<u8> {
        *img.get_pixel(WIDTH / 2, HEIGHT / 2)
    }

    #[test]
    fn sky_fills_the_background() {
        let Some(mut offscreen) = Offscreen::new() else {
            return;
        };
        offscreen.render().unwrap();
        let img = offscreen.read_pixels();

        for (x, y) in [(0, 0), (WIDTH - 1, 0), (0, HEIGHT - 1), (WIDTH - 1, HEIGHT - 1)] {
            let pixel = img.get_pixel(x, y);
            assert!(pixel.0[..3].iter().any(|c| *c > 0), "corner ({x}, {y}) is {:?}", pixel);
        }
    }

    #[test]
    fn sphere_covers_the_centre_until_tessellation_culls_it() {
        let Some(mut offscreen) = Offscreen::new() else {
            return;
        };
        offscreen.render().unwrap();
        let with_sphere = centre(&offscreen.read_pixels());

        offscreen.scene.params.tessellation_amount = 0.0;
        offscreen.render().unwrap();
        let sky_only = centre(&offscreen.read_pixels());

        assert_ne!(with_sphere, sky_only);
    }

    #[test]
    fn pipelines_are_built_once_per_state() {
        let Some(mut offscreen) = Offscreen::new() else {
            return;
        };
        offscreen.render().unwrap();
        offscreen.render().unwrap();
        assert_eq!(offscreen.scene.cached_pipelines(), 2);

        offscreen.scene.params.fill_mode = FillMode::Wireframe;
        offscreen.render().unwrap();
        assert_eq!(offscreen.scene.cached_pipelines(), 3);
    }

    #[test]
    fn camera_starts_from_the_configured_window() {
        let Some(offscreen) = Offscreen::with_config(DemoConfig::default()) else {
            return;
        };
        let camera = &offscreen.scene.camera;
        assert!((camera.aspect_ratio() - 1280.0 / 720.0).abs() < 1e-5);
        let start: [f32; 3] = camera.position.into();
        assert_eq!(start, CAMERA_START);
    }

    #[test]
    fn gpu_validation_errors_do_not_abort() {
        let Some(mut offscreen) = Offscreen::new() else {
            return;
        };
        // Mapping for both reading and writing is invalid without
        // MAPPABLE_PRIMARY_BUFFERS, which is never requested.
        let _invalid = offscreen.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("invalid usage"),
            size: 16,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::MAP_WRITE,
            mapped_at_creation: false,
        });
        offscreen.render().unwrap();
    }
}
