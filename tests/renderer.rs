use anyhow::{anyhow, Result};

use deimos::*;

use crate::framework::*;

mod framework;

type Cmd = RecordingCommands;

fn make_renderer(settings: &RenderSettings) -> Result<Renderer<FakeFrameBackend>> {
    Renderer::new(settings, FakeFrameBackend::new())
}

fn color_write() -> BarrierState {
    ResourceUsage::ColorAttachment {
        load_op: vk::AttachmentLoadOp::CLEAR,
    }
    .required_state()
}

#[test]
pub fn barriers_are_emitted_once() -> Result<()> {
    let mut ctx = make_context()?;
    let albedo = ctx
        .resources
        .create_color_attachment(AttachmentSpec::new("albedo"), vk::SampleCountFlags::TYPE_1)?;
    let depth = ctx
        .resources
        .create_depth_attachment(AttachmentSpec::new("depth"), vk::SampleCountFlags::TYPE_1)?;
    let pass = PassBuilder::<Cmd>::render("gbuffer")
        .clear_color_attachment("albedo", ClearColor::Float([0.0; 4]))?
        .clear_depth_attachment("depth", ClearDepthStencil::default())?
        .build();
    let graph = RenderGraphBuilder::new().add_pass(pass)?.build(&ctx.resources)?;
    let mut renderer = make_renderer(&ctx.settings)?;
    let mut cmd = RecordingCommands::default();

    let count = renderer.apply_pass_barriers(&graph.passes()[0], &mut ctx.resources, &mut cmd, 0, 0)?;
    assert_eq!(count, 2);
    let count = renderer.apply_pass_barriers(&graph.passes()[0], &mut ctx.resources, &mut cmd, 0, 0)?;
    assert_eq!(count, 0);

    // A single batch, nothing recorded for the second call.
    let batches = cmd.barrier_batches();
    assert_eq!(batches.len(), 1);
    let color = batches[0][0];
    assert_eq!(color.image, ctx.resources.attachment(albedo, 0, 0)?.image());
    assert_eq!(color.old_layout, vk::ImageLayout::UNDEFINED);
    assert_eq!(color.new_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    assert_eq!(color.src_stage, vk::PipelineStageFlags2::TOP_OF_PIPE);
    assert_eq!(color.dst_stage, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
    assert_eq!(color.dst_access, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE);

    let depth_barrier = batches[0][1];
    assert_eq!(depth_barrier.image, ctx.resources.attachment(depth, 0, 0)?.image());
    assert_eq!(depth_barrier.new_layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
    assert_eq!(depth_barrier.aspect, vk::ImageAspectFlags::DEPTH);

    assert_eq!(ctx.resources.attachment(albedo, 0, 0)?.state(), color_write());
    assert_eq!(renderer.used_attachments().len(), 2);
    Ok(())
}

#[test]
pub fn read_after_write_barrier() -> Result<()> {
    let mut ctx = make_context()?;
    ctx.resources
        .create_color_attachment(AttachmentSpec::new("offscreen"), vk::SampleCountFlags::TYPE_1)?;
    let write = PassBuilder::<Cmd>::render("write")
        .clear_color_attachment("offscreen", ClearColor::Float([1.0, 0.0, 0.0, 1.0]))?
        .build();
    let read = PassBuilder::<Cmd>::new("read")
        .sample_image("offscreen", vk::PipelineStageFlags2::COMPUTE_SHADER)
        .build();
    let graph = RenderGraphBuilder::new().add_pass(write)?.add_pass(read)?.build(&ctx.resources)?;
    let mut renderer = make_renderer(&ctx.settings)?;
    let mut cmd = RecordingCommands::default();
    for pass in graph.passes() {
        renderer.apply_pass_barriers(pass, &mut ctx.resources, &mut cmd, 0, 0)?;
    }

    let batches = cmd.barrier_batches();
    assert_eq!(batches.len(), 2);
    let barrier = batches[1][0];
    assert_eq!(barrier.old_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    assert_eq!(barrier.new_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    assert_eq!(barrier.src_stage, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
    assert_eq!(barrier.src_access, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE);
    assert_eq!(barrier.dst_stage, vk::PipelineStageFlags2::COMPUTE_SHADER);
    assert_eq!(barrier.dst_access, vk::AccessFlags2::SHADER_SAMPLED_READ);
    // The attachment is used once, even though two passes touched it.
    assert_eq!(renderer.used_attachments().len(), 1);
    Ok(())
}

#[test]
pub fn multisampled_attachment_transitions_transient() -> Result<()> {
    let mut ctx = make_context()?;
    let scene = ctx
        .resources
        .create_color_attachment(AttachmentSpec::new("scene"), vk::SampleCountFlags::TYPE_4)?;
    let pass = PassBuilder::<Cmd>::render("scene")
        .clear_color_attachment("scene", ClearColor::Float([0.0; 4]))?
        .sample_image("backbuffer", vk::PipelineStageFlags2::FRAGMENT_SHADER)
        .build();
    let graph = RenderGraphBuilder::new().add_pass(pass)?.build(&ctx.resources)?;
    let mut renderer = make_renderer(&ctx.settings)?;
    let mut cmd = RecordingCommands::default();
    let count = renderer.apply_pass_barriers(&graph.passes()[0], &mut ctx.resources, &mut cmd, 1, 0)?;
    // Primary and transient image of the attachment, and the sampled backbuffer. Sampling never touches a transient.
    assert_eq!(count, 3);

    let container = ctx.resources.container(scene).unwrap();
    let transient = container.transient().unwrap();
    assert_eq!(transient.attachment.state(), color_write());
    let used = renderer.used_attachments();
    assert!(used.contains(&UsedAttachment {
        container: scene,
        image_index: 1,
        frame_index: 0,
        transient: true,
    }));
    assert!(used.contains(&UsedAttachment {
        container: scene,
        image_index: 1,
        frame_index: 0,
        transient: false,
    }));
    Ok(())
}

#[test]
pub fn unbound_pass_is_an_error() -> Result<()> {
    let mut ctx = make_context()?;
    let pass = PassBuilder::<Cmd>::render("loose")
        .clear_color_attachment("backbuffer", ClearColor::Float([0.0; 4]))?
        .build();
    let mut renderer = make_renderer(&ctx.settings)?;
    let mut cmd = RecordingCommands::default();
    let err = renderer
        .apply_pass_barriers(&pass, &mut ctx.resources, &mut cmd, 0, 0)
        .unwrap_err();
    assert!(is_error(&err, |e| matches!(e, Error::NoResourceBound(_))));
    Ok(())
}

#[test]
pub fn graph_build_checks_resources() -> Result<()> {
    let mut ctx = make_context()?;
    ctx.resources
        .create_depth_attachment(AttachmentSpec::new("depth"), vk::SampleCountFlags::TYPE_1)?;

    let missing = PassBuilder::<Cmd>::render("missing")
        .clear_color_attachment("normals", ClearColor::Float([0.0; 4]))?
        .build();
    let err = RenderGraphBuilder::new()
        .add_pass(missing)?
        .build(&ctx.resources)
        .unwrap_err();
    assert!(is_error(&err, |e| matches!(e, Error::NoResourceBound(name) if name == "normals")));

    let mismatch = PassBuilder::<Cmd>::render("mismatch")
        .clear_color_attachment("depth", ClearColor::Float([0.0; 4]))?
        .build();
    assert!(RenderGraphBuilder::new()
        .add_pass(mismatch)?
        .build(&ctx.resources)
        .is_err());

    let first = PassBuilder::<Cmd>::new("same").build();
    let second = PassBuilder::<Cmd>::new("same").build();
    let err = RenderGraphBuilder::new().add_pass(first)?.add_pass(second).unwrap_err();
    assert!(is_error(&err, |e| matches!(e, Error::DuplicateResource(name) if name == "same")));
    Ok(())
}

#[test]
pub fn pass_builder_validation() -> Result<()> {
    assert!(PassBuilder::<Cmd>::new("compute")
        .clear_color_attachment("backbuffer", ClearColor::Float([0.0; 4]))
        .is_err());
    let err = PassBuilder::<Cmd>::render("no_clear")
        .color_attachment("backbuffer", vk::AttachmentLoadOp::CLEAR, None)
        .err()
        .unwrap();
    assert!(is_error(&err, |e| matches!(e, Error::NoClearValue)));
    assert!(PassBuilder::<Cmd>::render("two_depths")
        .load_depth_attachment("a")?
        .load_depth_attachment("b")
        .is_err());
    Ok(())
}

#[test]
pub fn renders_and_presents_frame() -> Result<()> {
    let mut ctx = make_context()?;
    let hdr = ctx
        .resources
        .create_color_attachment(AttachmentSpec::new("hdr"), vk::SampleCountFlags::TYPE_1)?;
    let scene = PassBuilder::<Cmd>::render("scene")
        .clear_color_attachment("hdr", ClearColor::Float([0.0; 4]))?
        .execute_fn(|cmd, ctx| {
            assert_eq!(ctx.render_area.extent, extent(1280, 720));
            cmd.draw("scene");
            Ok(())
        })
        .build();
    let composite = PassBuilder::<Cmd>::render("composite")
        .clear_color_attachment("backbuffer", ClearColor::Float([0.0; 4]))?
        .sample_image("hdr", vk::PipelineStageFlags2::FRAGMENT_SHADER)
        .execute_fn(|cmd, _ctx| {
            cmd.draw("composite");
            Ok(())
        })
        .build();
    let mut graph = RenderGraphBuilder::new()
        .add_pass(scene)?
        .add_pass(composite)?
        .build(&ctx.resources)?;
    let mut renderer = make_renderer(&ctx.settings)?;

    let status = renderer.render_frame(&mut graph, &mut ctx.resources, &mut ctx.swapchain)?;
    assert_eq!(
        status,
        FrameStatus::Presented {
            image_index: 0,
            frame_index: 0,
        }
    );
    assert_eq!(ctx.swapchain.presented, vec![0]);
    assert_eq!(renderer.backend().waited, vec![0]);

    let commands = renderer.backend().last_submission().unwrap();
    assert_eq!(
        commands.summary(),
        vec![
            "barrier x1",
            "begin",
            "draw scene",
            "end",
            "barrier x2",
            "begin",
            "draw composite",
            "end",
            "barrier x1",
        ]
    );

    let batches = commands.barrier_batches();
    let backbuffer_image = ctx.swapchain.images[0];
    // Declaration order: the backbuffer first, then the sampled image.
    assert_eq!(batches[1][0].image, backbuffer_image);
    assert_eq!(batches[1][0].old_layout, vk::ImageLayout::UNDEFINED);
    assert_eq!(batches[1][1].new_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    let present = batches[2][0];
    assert_eq!(present.image, backbuffer_image);
    assert_eq!(present.old_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
    assert_eq!(present.new_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    assert_eq!(present.dst_stage, vk::PipelineStageFlags2::BOTTOM_OF_PIPE);

    let infos = commands.rendering_infos();
    assert_eq!(infos[1].color_attachments.len(), 1);
    assert_eq!(infos[1].color_attachments[0].image_view, ctx.swapchain.views[0]);
    assert_eq!(infos[1].color_attachments[0].load_op, vk::AttachmentLoadOp::CLEAR);
    assert_eq!(infos[1].color_attachments[0].store_op, vk::AttachmentStoreOp::STORE);

    // Everything is back in the initial state for the next frame.
    assert!(renderer.used_attachments().is_empty());
    assert_eq!(ctx.resources.attachment(hdr, 0, 0)?.state(), BarrierState::INITIAL);
    assert_eq!(ctx.resources.attachment(BACKBUFFER_INDEX, 0, 0)?.state(), BarrierState::INITIAL);
    assert_eq!(renderer.frame_index(), 1);
    Ok(())
}

#[test]
pub fn frame_index_wraps() -> Result<()> {
    let mut ctx = make_context()?;
    let pass = PassBuilder::<Cmd>::render("clear")
        .clear_color_attachment("backbuffer", ClearColor::Float([0.0; 4]))?
        .build();
    let mut graph = RenderGraphBuilder::new().add_pass(pass)?.build(&ctx.resources)?;
    let mut renderer = make_renderer(&ctx.settings)?;

    let mut statuses = vec![];
    for _ in 0..4 {
        statuses.push(renderer.render_frame(&mut graph, &mut ctx.resources, &mut ctx.swapchain)?);
    }
    let expected = [(0, 0), (1, 1), (2, 0), (0, 1)]
        .into_iter()
        .map(|(image_index, frame_index)| FrameStatus::Presented {
            image_index,
            frame_index,
        })
        .collect::<Vec<_>>();
    assert_eq!(statuses, expected);
    assert_eq!(renderer.backend().begun, vec![0, 1, 0, 1]);

    // Every frame starts from the initial state again.
    for (_, commands) in &renderer.backend().submitted {
        let batches = commands.barrier_batches();
        assert_eq!(batches[0][0].old_layout, vk::ImageLayout::UNDEFINED);
    }
    Ok(())
}

#[test]
pub fn multisampled_rendering_resolves() -> Result<()> {
    let mut ctx = make_context()?;
    let scene = ctx
        .resources
        .create_color_attachment(AttachmentSpec::new("scene"), vk::SampleCountFlags::TYPE_4)?;
    let pass = PassBuilder::<Cmd>::render("scene")
        .clear_color_attachment("scene", ClearColor::Float([0.0; 4]))?
        .build();
    let mut graph = RenderGraphBuilder::new().add_pass(pass)?.build(&ctx.resources)?;
    let mut renderer = make_renderer(&ctx.settings)?;
    renderer.render_frame(&mut graph, &mut ctx.resources, &mut ctx.swapchain)?;

    let container = ctx.resources.container(scene).unwrap();
    let primary = container.attachments()[0].view();
    let transient = container.transient().unwrap().attachment.view();
    let commands = renderer.backend().last_submission().unwrap();
    let info = commands.rendering_infos()[0];
    let color = info.color_attachments[0];
    assert_eq!(color.image_view, transient);
    assert_eq!(color.resolve_image_view, Some(primary));
    assert_eq!(color.resolve_mode, Some(vk::ResolveModeFlags::AVERAGE));
    assert_eq!(color.store_op, vk::AttachmentStoreOp::DONT_CARE);
    assert_eq!(commands.barrier_batches()[0].len(), 2);

    // The transient image is reset along with the primary one.
    assert_eq!(container.transient().unwrap().attachment.state(), BarrierState::INITIAL);
    Ok(())
}

#[test]
pub fn depth_stencil_attachment_binds_stencil() -> Result<()> {
    let mut ctx = make_context()?;
    ctx.resources.create_depth_attachment(
        AttachmentSpec::new("depth").format(vk::Format::D24_UNORM_S8_UINT),
        vk::SampleCountFlags::TYPE_1,
    )?;
    let pass = PassBuilder::<Cmd>::render("depth_only")
        .clear_depth_attachment(
            "depth",
            ClearDepthStencil {
                depth: 1.0,
                stencil: 0,
            },
        )?
        .build();
    let mut graph = RenderGraphBuilder::new().add_pass(pass)?.build(&ctx.resources)?;
    let mut renderer = make_renderer(&ctx.settings)?;
    renderer.render_frame(&mut graph, &mut ctx.resources, &mut ctx.swapchain)?;

    let commands = renderer.backend().last_submission().unwrap();
    let info = commands.rendering_infos()[0];
    assert!(info.color_attachments.is_empty());
    assert!(info.depth_attachment.is_some());
    assert!(info.stencil_attachment.is_some());
    assert_eq!(
        commands.barrier_batches()[0][0].aspect,
        vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
    );
    Ok(())
}

#[test]
pub fn out_of_date_acquire_abandons_frame() -> Result<()> {
    let mut ctx = make_context()?;
    let pass = PassBuilder::<Cmd>::render("clear")
        .clear_color_attachment("backbuffer", ClearColor::Float([0.0; 4]))?
        .build();
    let mut graph = RenderGraphBuilder::new().add_pass(pass)?.build(&ctx.resources)?;
    let mut renderer = make_renderer(&ctx.settings)?;

    ctx.swapchain.acquire_script.push_back(SwapchainStatus::OutOfDate);
    let status = renderer.render_frame(&mut graph, &mut ctx.resources, &mut ctx.swapchain)?;
    assert_eq!(status, FrameStatus::Abandoned);
    assert!(ctx.swapchain.is_invalid());
    assert!(renderer.backend().submitted.is_empty());
    assert_eq!(renderer.frame_index(), 0);

    // Nothing happens until the swapchain is recreated.
    let status = renderer.render_frame(&mut graph, &mut ctx.resources, &mut ctx.swapchain)?;
    assert_eq!(status, FrameStatus::Abandoned);
    assert_eq!(renderer.backend().waited.len(), 1);

    ctx.swapchain.resize(extent(800, 600));
    ctx.surface = surface_for(&ctx.swapchain);
    ctx.resources.recreate(&ctx.swapchain, &ctx.surface)?;
    renderer.on_swapchain_recreated()?;
    assert_eq!(renderer.backend().resets, 1);

    let status = renderer.render_frame(&mut graph, &mut ctx.resources, &mut ctx.swapchain)?;
    assert_eq!(
        status,
        FrameStatus::Presented {
            image_index: 0,
            frame_index: 0,
        }
    );
    let commands = renderer.backend().last_submission().unwrap();
    assert_eq!(commands.rendering_infos()[0].render_area.extent, extent(800, 600));
    assert_eq!(commands.barrier_batches()[0][0].image, ctx.swapchain.images[0]);
    Ok(())
}

#[test]
pub fn suboptimal_present_abandons_frame() -> Result<()> {
    let mut ctx = make_context()?;
    let pass = PassBuilder::<Cmd>::render("clear")
        .clear_color_attachment("backbuffer", ClearColor::Float([0.0; 4]))?
        .build();
    let mut graph = RenderGraphBuilder::new().add_pass(pass)?.build(&ctx.resources)?;
    let mut renderer = make_renderer(&ctx.settings)?;

    ctx.swapchain.present_script.push_back(SwapchainStatus::Suboptimal);
    let status = renderer.render_frame(&mut graph, &mut ctx.resources, &mut ctx.swapchain)?;
    assert_eq!(status, FrameStatus::Abandoned);
    assert!(ctx.swapchain.is_invalid());
    // The frame was submitted, so its slot is in use.
    assert_eq!(renderer.backend().submitted.len(), 1);
    assert_eq!(renderer.frame_index(), 1);
    assert!(renderer.used_attachments().is_empty());
    assert_eq!(ctx.resources.attachment(BACKBUFFER_INDEX, 0, 0)?.state(), BarrierState::INITIAL);
    Ok(())
}

#[test]
pub fn executor_errors_are_propagated() -> Result<()> {
    let mut ctx = make_context()?;
    let pass = PassBuilder::<Cmd>::new("broken")
        .execute_fn(|_cmd, _ctx| Err(anyhow!("shader compilation failed")))
        .build();
    let mut graph = RenderGraphBuilder::new().add_pass(pass)?.build(&ctx.resources)?;
    let mut renderer = make_renderer(&ctx.settings)?;
    assert!(renderer
        .render_frame(&mut graph, &mut ctx.resources, &mut ctx.swapchain)
        .is_err());
    assert!(renderer.backend().submitted.is_empty());
    Ok(())
}

#[test]
pub fn per_frame_attachments_follow_frame_index() -> Result<()> {
    let mut ctx = make_context()?;
    let history = ctx
        .resources
        .create_frame_attachment(AttachmentSpec::new("history"), vk::SampleCountFlags::TYPE_1)?;
    let pass = PassBuilder::<Cmd>::render("accumulate")
        .load_color_attachment("history")?
        .build();
    let mut graph = RenderGraphBuilder::new().add_pass(pass)?.build(&ctx.resources)?;
    let mut renderer = make_renderer(&ctx.settings)?;
    renderer.render_frame(&mut graph, &mut ctx.resources, &mut ctx.swapchain)?;
    renderer.render_frame(&mut graph, &mut ctx.resources, &mut ctx.swapchain)?;

    let slots = ctx.resources.container(history).unwrap().attachments().to_vec();
    let submitted = &renderer.backend().submitted;
    assert_eq!(submitted[0].1.barrier_batches()[0][0].image, slots[0].image());
    assert_eq!(submitted[1].1.barrier_batches()[0][0].image, slots[1].image());
    let load = submitted[0].1.barrier_batches()[0][0];
    assert_eq!(
        load.dst_access,
        vk::AccessFlags2::COLOR_ATTACHMENT_READ | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE
    );
    Ok(())
}

#[test]
pub fn invalid_settings_are_rejected() {
    let settings = RenderSettings {
        frames_in_flight: 1,
        ..Default::default()
    };
    let err = make_renderer(&settings).unwrap_err();
    assert!(is_error(&err, |e| matches!(e, Error::InvalidFramesInFlight(1))));
}
