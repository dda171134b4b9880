mod alloc;
mod bind;
mod fission;
mod inline;
mod loops;
mod memory;
mod replace;
mod split;
mod workflow;
