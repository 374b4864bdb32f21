pub mod channel_guidance_sink;
