#[cfg(feature = "integration-tests")]
use card_ngin::flow::ImageTestResult;
use card_ngin::{
    context::Context,
    flow::{FlowConsturctor, GraphicsFlow, Out},
    render::Render,
};
use wgpu::Color;

use crate::common::test_utils::{Frame, State};

mod common;

enum Event {
    Test,
}

struct GraphicsElement;

impl GraphicsFlow<State, Event> for GraphicsElement {
    fn on_init(&mut self, ctx: &mut Context, state: &mut State) -> Out<Event> {
        ctx.clear_colour = Color::TRANSPARENT;
        assert_eq!(state.frame_counter(), 0);
        assert_eq!(state.init_invocations(), 0);
        assert_eq!(state.update_invocations(), 0);

        state.init();
        Out::Empty
    }

    fn on_update(&mut self, _: &Context, state: &mut State, _: instant::Duration) -> Out<Event> {
        assert_eq!(state.frame_counter(), state.update_invocations());
        assert_eq!(state.init_invocations(), 1);
        state.frame();
        state.update();

        match state.frame_counter() {
            3 => Out::FutEvent(vec![
                Box::new(async move { Event::Test }),
                Box::new(async move { Event::Test }),
            ]),
            5 => Out::Configure(Box::new(|ctx: &mut Context| ctx.clear_colour = Color::BLACK)),
            _ => Out::Empty,
        }
    }

    fn on_window_events(&mut self, _: &Context, _: &mut State, _: &card_ngin::WindowEvent) -> Out<Event> {
        Out::Empty
    }

    fn on_custom_events(&mut self, _: &Context, state: &mut State, event: Event) -> Option<Event> {
        match event {
            Event::Test => {
                // the futures are handed out in frame 3
                assert!(state.frame_counter() >= 3);
                state.custom();
                None
            }
        }
    }

    fn on_render(&self) -> Render<'_> {
        Render::None
    }

    #[cfg(feature = "integration-tests")]
    fn render_to_texture(&self, ctx: &Context, state: &mut State, _: &mut Frame) -> anyhow::Result<ImageTestResult> {
        if state.frame_counter() <= 5 || state.custom_invocations() < 2 {
            return Ok(ImageTestResult::Waiting);
        }
        assert_eq!(state.custom_invocations(), 2);
        assert_eq!(ctx.clear_colour, Color::BLACK);
        Ok(ImageTestResult::Passed)
    }
}

#[test]
#[cfg(feature = "integration-tests")]
fn should_deliver_events_and_configure_the_context() {
    let model_constructor: FlowConsturctor<State, Event> =
        Box::new(|_| Box::pin(async move { Ok(Box::new(GraphicsElement) as Box<dyn GraphicsFlow<_, _>>) }));

    if let Err(e) = card_ngin::flow::run(vec![model_constructor]) {
        panic!("{}", e);
    }
}
