mod concurrent_take;
mod round_trip;
