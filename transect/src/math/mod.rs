mod bilinear;
mod linspace;

pub(crate) use {bilinear::bilinear, linspace::linspace};
