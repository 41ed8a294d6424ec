#[cfg(feature = "integration-tests")]
mod common;

#[test]
#[cfg(feature = "integration-tests")]
fn should_render_clear_colour() {
    use card_ngin::{context::InitContext, flow::ImageTestResult};
    use wgpu::Color;

    use crate::common::test_utils::{TestRender, to_pixel};

    golden_image_test!(async move |_: InitContext| {
        TestRender::new(
            |ctx| ctx.clear_colour = Color::WHITE,
            |_, state, texture| {
                if state.frame() == 0 {
                    return Ok(ImageTestResult::Waiting);
                }
                let desired_pixel = to_pixel(Color::WHITE);
                for pixel in texture.pixels() {
                    assert_eq!(*pixel, desired_pixel);
                }
                Ok(ImageTestResult::Passed)
            },
        )
    });
}
