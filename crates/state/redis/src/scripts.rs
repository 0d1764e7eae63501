//! Lua scripts implementing the four rate-limit algorithm primitives (§4.2).
//!
//! Each script is invoked as a single atomic `EVALSHA`/`EVAL` against one
//! key, so a primitive's read-modify-write can never be observed
//! mid-flight by a concurrent caller on the same key.

/// Token bucket (§4.2 "Token Bucket"). State: hash `{tokens, ts}`.
///
/// `KEYS[1]` = counter key.
/// `ARGV[1..4]` = capacity, refill_rate_per_sec, cost, now_ms.
/// Returns `{allowed, remaining, limit, reset_at, retry_after_ms}`.
pub const TOKEN_BUCKET: &str = r"
local capacity = tonumber(ARGV[1])
local refill = tonumber(ARGV[2])
local cost = tonumber(ARGV[3])
local now_ms = tonumber(ARGV[4])

local tokens
local ts
local existing = redis.call('HMGET', KEYS[1], 'tokens', 'ts')
if existing[1] then
  tokens = tonumber(existing[1])
  ts = tonumber(existing[2])
else
  tokens = capacity
  ts = now_ms
end

local elapsed = now_ms - ts
if elapsed < 0 then elapsed = 0 end
tokens = tokens + (elapsed / 1000.0) * refill
if tokens > capacity then tokens = capacity end

local allowed = tokens >= cost
if allowed then
  tokens = tokens - cost
end

redis.call('HMSET', KEYS[1], 'tokens', tostring(tokens), 'ts', tostring(now_ms))
local ttl
if refill > 0 then
  ttl = math.floor(capacity / refill) + 5
else
  ttl = 3600
end
redis.call('EXPIRE', KEYS[1], ttl)

local retry_after_ms
if allowed then
  retry_after_ms = 0
elseif refill > 0 then
  retry_after_ms = math.ceil((cost - tokens) / refill * 1000)
else
  retry_after_ms = 3600000
end

local remaining = math.floor(tokens)
local reset_at = math.ceil((now_ms + retry_after_ms) / 1000)

return {allowed and 1 or 0, remaining, capacity, reset_at, retry_after_ms}
";

/// Fixed window (§4.2 "Fixed Window"). State: integer counter.
///
/// `KEYS[1]` = counter key (already encodes the window epoch).
/// `ARGV[1..4]` = limit, window_sec, cost, now_ms.
/// Returns `{allowed, remaining, limit, reset_at, retry_after_ms}`.
///
/// The increment is never rolled back on block (spec.md §4.2 note, §9 open
/// question #1): a blocked call still consumes quota for the window.
pub const FIXED_WINDOW: &str = r"
local limit = tonumber(ARGV[1])
local window_sec = tonumber(ARGV[2])
local cost = tonumber(ARGV[3])
local now_ms = tonumber(ARGV[4])

local counter = redis.call('INCRBY', KEYS[1], cost)
if counter == cost then
  redis.call('EXPIRE', KEYS[1], window_sec)
end

local allowed = counter <= limit
local remaining = limit - counter
if remaining < 0 then remaining = 0 end

local now_sec = math.floor(now_ms / 1000)
local window_start = now_sec - (now_sec % window_sec)
local reset_at = window_start + window_sec

local retry_after_ms = 0
if not allowed then
  retry_after_ms = reset_at * 1000 - now_ms
  if retry_after_ms < 0 then retry_after_ms = 0 end
end

return {allowed and 1 or 0, remaining, limit, reset_at, retry_after_ms}
";

/// Sliding window log (§4.2 "Sliding Window"). State: sorted set of event
/// timestamps scored by occurrence time in ms.
///
/// `KEYS[1]` = counter key.
/// `ARGV[1..5]` = limit, window_sec, cost, now_ms, nonce.
/// Returns `{allowed, remaining, limit, reset_at, retry_after_ms}`.
///
/// Members are namespaced `"{now_ms}:{nonce}:{i}"` (§9 open question #3) so
/// two requests landing at the same millisecond with `cost > 1` cannot
/// collide on the same sorted-set member.
pub const SLIDING_WINDOW: &str = r"
local limit = tonumber(ARGV[1])
local window_sec = tonumber(ARGV[2])
local cost = tonumber(ARGV[3])
local now_ms = tonumber(ARGV[4])
local nonce = ARGV[5]

local window_ms = window_sec * 1000
local cutoff = now_ms - window_ms
redis.call('ZREMRANGEBYSCORE', KEYS[1], '-inf', cutoff)

local count = redis.call('ZCARD', KEYS[1])
local allowed = (count + cost) <= limit

if allowed then
  for i = 0, cost - 1 do
    local member = tostring(now_ms) .. ':' .. nonce .. ':' .. tostring(i)
    redis.call('ZADD', KEYS[1], now_ms + i, member)
  end
  redis.call('PEXPIRE', KEYS[1], window_ms + 1000)
end

local earliest_entries = redis.call('ZRANGE', KEYS[1], 0, 0, 'WITHSCORES')
local earliest
if earliest_entries[2] then
  earliest = tonumber(earliest_entries[2])
else
  earliest = now_ms
end

local retry_after_ms = 0
if not allowed then
  retry_after_ms = (earliest + window_ms) - now_ms
  if retry_after_ms < 0 then retry_after_ms = 0 end
end

local used = count
if allowed then used = used + cost end
local remaining = limit - used
if remaining < 0 then remaining = 0 end

local reset_at = math.ceil((earliest + window_ms) / 1000)

return {allowed and 1 or 0, remaining, limit, reset_at, retry_after_ms}
";

/// Concurrency acquire (§4.2 "Concurrency"). State: integer in-flight count.
///
/// `KEYS[1]` = counter key.
/// `ARGV[1..4]` = limit, ttl_sec, cost, now_sec.
/// Returns `{allowed, remaining, limit, reset_at, retry_after_ms}`. Rolls
/// back the increment on block.
pub const CONCURRENCY_ACQUIRE: &str = r"
local limit = tonumber(ARGV[1])
local ttl_sec = tonumber(ARGV[2])
local cost = tonumber(ARGV[3])
local now_sec = tonumber(ARGV[4])

local n = redis.call('INCRBY', KEYS[1], cost)
local ttl = redis.call('TTL', KEYS[1])
if ttl < 0 then
  redis.call('EXPIRE', KEYS[1], ttl_sec)
end

local allowed
local remaining
local retry_after_ms
if n <= limit then
  allowed = true
  remaining = limit - n
  retry_after_ms = 0
else
  redis.call('DECRBY', KEYS[1], cost)
  allowed = false
  remaining = 0
  retry_after_ms = ttl_sec * 1000
end

local reset_at = now_sec + ttl_sec

return {allowed and 1 or 0, remaining, limit, reset_at, retry_after_ms}
";

/// Concurrency release (§4.2 step 4). State: integer in-flight count.
///
/// `KEYS[1]` = counter key. `ARGV[1]` = cost.
/// Returns the new counter value; deletes the key and returns `0` rather
/// than going negative.
pub const CONCURRENCY_RELEASE: &str = r"
local cost = tonumber(ARGV[1])
local n = redis.call('DECRBY', KEYS[1], cost)
if n < 0 then
  redis.call('DEL', KEYS[1])
  return 0
end
return n
";
