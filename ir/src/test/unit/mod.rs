mod effects;
mod memory;
mod pattern;
mod shape;
mod typecheck;
