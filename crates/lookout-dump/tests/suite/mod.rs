mod bounds;
mod levels;
