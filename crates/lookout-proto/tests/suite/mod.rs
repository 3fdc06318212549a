mod frame_limits;
mod wire_shapes;
